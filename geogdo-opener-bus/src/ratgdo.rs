//! Topic layout and command set for ratgdo controllers.
//!
//! ratgdo firmware publishes door status under fixed suffixes of its topic
//! prefix and accepts `open`/`close` payloads on a single command topic, so
//! the whole adapter config collapses to a prefix.

use crate::opener::BusCommand;

/// Status topic suffixes a ratgdo controller publishes under its prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatgdoTopics {
    pub door: String,
    pub obstruction: String,
    pub availability: String,
}

impl RatgdoTopics {
    pub fn under(prefix: &str) -> Self {
        Self {
            door: format!("{prefix}/status/door"),
            obstruction: format!("{prefix}/status/obstruction"),
            availability: format!("{prefix}/status/availability"),
        }
    }
}

/// The two commands every ratgdo door understands.
pub fn ratgdo_commands() -> Vec<BusCommand> {
    vec![
        BusCommand {
            name: "open".into(),
            payload: "open".into(),
            topic_suffix: "command/door".into(),
            required_start_state: "closed".into(),
            required_stop_state: "open".into(),
            timeout_secs: None,
        },
        BusCommand {
            name: "close".into(),
            payload: "close".into(),
            topic_suffix: "command/door".into(),
            required_start_state: "open".into(),
            required_stop_state: "closed".into(),
            timeout_secs: None,
        },
    ]
}

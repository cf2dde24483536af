//! Contract between the door-operation engine and opener adapters.
//!
//! An opener drives one physical garage door controller. The engine only
//! ever asks it to reach a target state; how that happens (command bus,
//! HTTP endpoint, nothing at all) is the adapter's business.
//!
//! Adapters must uphold two rules:
//!
//! * if the door is already in the state the command would start from
//!   being *violated* (it is already where the action ends up), report
//!   success without sending anything;
//! * if the adapter can observe door status, it must not report success
//!   until the door reaches the target state, and must fail with
//!   [`OpenerError::Timeout`] otherwise.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use geogdo_types::Action;
use tracing::info;

/// Why a status wait timed out, as far as the adapter can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusHint {
    /// The controller reported itself unavailable.
    Offline,
    /// The controller reported an obstruction in the door path.
    Obstructed,
    /// No extra signal beyond the missing state change.
    Unknown,
}

impl std::fmt::Display for StatusHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StatusHint::Offline => "device is offline",
            StatusHint::Obstructed => "door path is obstructed",
            StatusHint::Unknown => "no further status received",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenerError {
    /// The adapter has no command configured for the requested action.
    #[error("no command configured for action `{0}`")]
    NoCommand(Action),

    /// Delivering the command itself failed.
    #[error("failed to send `{action}` command")]
    Send {
        action: Action,
        #[source]
        source: anyhow::Error,
    },

    /// The command was delivered but the door never reported the expected
    /// state within the adapter's timeout.
    #[error("door did not reach state `{expected}` (last seen `{last_state}`): {hint}")]
    Timeout {
        expected: String,
        last_state: String,
        hint: StatusHint,
    },

    /// The status feed itself failed while waiting.
    #[error("door status feed failed")]
    Status(#[source] anyhow::Error),
}

/// A door controller adapter.
#[async_trait]
pub trait Opener: Send + Sync {
    /// Adapter name for log lines, e.g. `ratgdo` or `http`.
    fn name(&self) -> &str;

    /// Drive the door to the state implied by `action` and, when status is
    /// observable, wait for it to get there.
    async fn set_state(&self, action: Action) -> Result<(), OpenerError>;
}

/// Opener that logs the request and does nothing. Used when a door has no
/// controller configured and for dry runs.
#[derive(Debug, Default)]
pub struct NoopOpener {
    operations: AtomicU32,
}

impl NoopOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations requested so far.
    pub fn operations(&self) -> u32 {
        self.operations.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Opener for NoopOpener {
    fn name(&self) -> &str {
        "noop"
    }

    async fn set_state(&self, action: Action) -> Result<(), OpenerError> {
        self.operations.fetch_add(1, Ordering::Relaxed);
        info!(%action, "no opener configured, skipping door operation");
        Ok(())
    }
}

//! Line-based message bridge on stdin/stdout.
//!
//! The daemon speaks newline-delimited `<topic> <payload>` messages: broker
//! subscriptions are piped into stdin and outgoing door commands are
//! written to stdout, so any external bridge (for example a
//! `mosquitto_sub`/`mosquitto_pub` pair) connects it to a real broker
//! without the process holding broker credentials itself.

use async_trait::async_trait;
use geogdo_opener_bus::CommandBus;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMessage {
    pub topic: String,
    pub payload: String,
}

/// Split one feed line into topic and payload. The payload is everything
/// after the first space and may be empty.
pub fn parse_line(line: &str) -> Option<FeedMessage> {
    let line = line.trim_end();
    if line.is_empty() {
        return None;
    }
    let (topic, payload) = line.split_once(' ').unwrap_or((line, ""));
    Some(FeedMessage {
        topic: topic.to_string(),
        payload: payload.trim().to_string(),
    })
}

/// Incoming message stream over stdin.
pub struct StdinFeed {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinFeed {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Next parsed message, skipping blank lines. `None` on end of input.
    pub async fn next(&mut self) -> anyhow::Result<Option<FeedMessage>> {
        loop {
            match self.lines.next_line().await? {
                Some(line) => {
                    if let Some(msg) = parse_line(&line) {
                        trace!(topic = %msg.topic, "feed message");
                        return Ok(Some(msg));
                    }
                }
                None => return Ok(None),
            }
        }
    }
}

/// Outgoing command publisher writing feed lines to stdout.
pub struct StdoutBus;

#[async_trait]
impl CommandBus for StdoutBus {
    async fn publish(&self, topic: &str, payload: &str) -> anyhow::Result<()> {
        let mut out = tokio::io::stdout();
        out.write_all(format!("{topic} {payload}\n").as_bytes())
            .await?;
        out.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lines_split_on_the_first_space() {
        let msg = parse_line("teslamate/cars/7/latitude 46.1925\n").unwrap();
        assert_eq!(msg.topic, "teslamate/cars/7/latitude");
        assert_eq!(msg.payload, "46.1925");

        let msg = parse_line("home/garage/main/status/door closed").unwrap();
        assert_eq!(msg.payload, "closed");
    }

    #[test]
    fn payload_may_be_empty() {
        let msg = parse_line("some/topic").unwrap();
        assert_eq!(msg.topic, "some/topic");
        assert_eq!(msg.payload, "");
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("\n"), None);
    }
}

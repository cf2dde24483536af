//! In-process bus for testing mode.
//!
//! Instead of reaching a broker, published door commands drive a simulated
//! door: the loopback flips the telemetry feed through a transitional state
//! and then the terminal one, so the full command/await cycle runs without
//! hardware.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

use crate::opener::CommandBus;
use crate::DoorTelemetry;

/// How long the simulated door spends in `opening`/`closing`.
const TRAVEL_TIME: Duration = Duration::from_millis(200);

pub struct LoopbackBus {
    status: watch::Sender<DoorTelemetry>,
}

impl LoopbackBus {
    /// Wires a simulated door to `status`. The sender is also marked
    /// `online` immediately so start-state guards see a live controller.
    pub fn new(status: watch::Sender<DoorTelemetry>, initial_state: &str) -> Self {
        let _ = status.send(DoorTelemetry {
            door_state: initial_state.to_string(),
            availability: "online".into(),
            obstruction: "clear".into(),
        });
        Self { status }
    }
}

#[async_trait]
impl CommandBus for LoopbackBus {
    async fn publish(&self, topic: &str, payload: &str) -> anyhow::Result<()> {
        let (travel, terminal) = match payload {
            "open" => ("opening", "open"),
            "close" => ("closing", "closed"),
            other => {
                info!(%topic, payload = %other, "loopback ignoring unknown payload");
                return Ok(());
            }
        };
        info!(%topic, %payload, "testing mode, simulating door travel");

        let status = self.status.clone();
        let travel = travel.to_string();
        let terminal = terminal.to_string();
        tokio::spawn(async move {
            let _ = status.send_modify(|t| t.door_state = travel);
            tokio::time::sleep(TRAVEL_TIME).await;
            let _ = status.send_modify(|t| t.door_state = terminal);
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry_channel;

    #[tokio::test]
    async fn simulated_door_reaches_terminal_state() {
        let (tx, mut rx) = telemetry_channel();
        let bus = LoopbackBus::new(tx, "closed");
        assert_eq!(rx.borrow_and_update().door_state, "closed");

        bus.publish("home/garage/main/command/door", "open")
            .await
            .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        loop {
            tokio::time::timeout_at(deadline, rx.changed())
                .await
                .expect("door never moved")
                .unwrap();
            if rx.borrow_and_update().door_state == "open" {
                break;
            }
        }
    }

    #[tokio::test]
    async fn unknown_payloads_are_ignored() {
        let (tx, rx) = telemetry_channel();
        let bus = LoopbackBus::new(tx, "closed");
        bus.publish("t", "jiggle").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rx.borrow().door_state, "closed");
    }
}

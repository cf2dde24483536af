use std::time::Duration;

use async_trait::async_trait;
use geogdo_opener_api::{Opener, OpenerError, StatusHint};
use geogdo_types::Action;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::DoorTelemetry;

/// How long to wait for the door to report its target state before giving
/// up on an operation.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport port for delivering command payloads. Implemented by the real
/// broker client in the binary and by [`crate::LoopbackBus`] in testing
/// mode.
#[async_trait]
pub trait CommandBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> anyhow::Result<()>;
}

/// One configured door command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusCommand {
    /// Matches [`Action::as_str`], so `open` or `close`.
    pub name: String,
    /// Payload published verbatim.
    pub payload: String,
    /// Appended to the opener's topic prefix.
    pub topic_suffix: String,
    /// If set, the command is only sent while the door reports this state.
    #[serde(default)]
    pub required_start_state: String,
    /// If set, the operation succeeds only once the door reports this state.
    #[serde(default)]
    pub required_stop_state: String,
    /// Seconds to wait for the stop state, overriding the opener-wide
    /// timeout for this command only.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Opener that drives a door controller over a command bus.
pub struct BusOpener {
    name: String,
    topic_prefix: String,
    commands: Vec<BusCommand>,
    status_timeout: Duration,
    bus: Box<dyn CommandBus>,
    status: watch::Receiver<DoorTelemetry>,
}

impl BusOpener {
    pub fn new(
        name: impl Into<String>,
        topic_prefix: impl Into<String>,
        commands: Vec<BusCommand>,
        status_timeout: Duration,
        bus: Box<dyn CommandBus>,
        status: watch::Receiver<DoorTelemetry>,
    ) -> Self {
        Self {
            name: name.into(),
            topic_prefix: topic_prefix.into(),
            commands,
            status_timeout,
            bus,
            status,
        }
    }

    fn command_for(&self, action: Action) -> Option<&BusCommand> {
        self.commands.iter().find(|c| c.name == action.as_str())
    }

    fn command_topic(&self, cmd: &BusCommand) -> String {
        format!("{}/{}", self.topic_prefix, cmd.topic_suffix)
    }

    fn effective_timeout(&self, cmd: &BusCommand) -> Duration {
        cmd.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.status_timeout)
    }

    /// Wait until the status feed reports `expected`, or fail with a hint
    /// taken from the last telemetry seen.
    async fn await_state(&self, expected: &str, timeout: Duration) -> Result<(), OpenerError> {
        let mut status = self.status.clone();
        let deadline = Instant::now() + timeout;

        loop {
            let snapshot = status.borrow_and_update().clone();
            if snapshot.door_state == expected {
                return Ok(());
            }
            match tokio::time::timeout_at(deadline, status.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => {
                    return Err(OpenerError::Status(anyhow::anyhow!(
                        "status feed closed while waiting for `{expected}`"
                    )));
                }
                Err(_) => {
                    let hint = if snapshot.is_offline() {
                        StatusHint::Offline
                    } else if snapshot.is_obstructed() {
                        StatusHint::Obstructed
                    } else {
                        StatusHint::Unknown
                    };
                    return Err(OpenerError::Timeout {
                        expected: expected.to_string(),
                        last_state: snapshot.door_state,
                        hint,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl Opener for BusOpener {
    fn name(&self) -> &str {
        &self.name
    }

    async fn set_state(&self, action: Action) -> Result<(), OpenerError> {
        let cmd = self
            .command_for(action)
            .ok_or(OpenerError::NoCommand(action))?;

        let current = self.status.borrow().door_state.clone();
        if !cmd.required_start_state.is_empty() && current != cmd.required_start_state {
            warn!(
                door = %self.name,
                %action,
                required = %cmd.required_start_state,
                %current,
                "door is not in the required start state, skipping command"
            );
            return Ok(());
        }

        let topic = self.command_topic(cmd);
        debug!(door = %self.name, %topic, payload = %cmd.payload, "publishing door command");
        self.bus
            .publish(&topic, &cmd.payload)
            .await
            .map_err(|source| OpenerError::Send { action, source })?;

        if cmd.required_stop_state.is_empty() {
            // Fire and forget: nothing to observe.
            info!(door = %self.name, %action, "command sent, no status to await");
            return Ok(());
        }

        self.await_state(&cmd.required_stop_state, self.effective_timeout(cmd))
            .await?;
        info!(door = %self.name, %action, state = %cmd.required_stop_state, "door reached target state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ratgdo_commands, telemetry_channel};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBus {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl CommandBus for RecordingBus {
        async fn publish(&self, topic: &str, payload: &str) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }

    struct RejectingBus;

    #[async_trait]
    impl CommandBus for RejectingBus {
        async fn publish(&self, topic: &str, _payload: &str) -> anyhow::Result<()> {
            panic!("no command expected, got publish to `{topic}`");
        }
    }

    struct FailingBus;

    #[async_trait]
    impl CommandBus for FailingBus {
        async fn publish(&self, _topic: &str, _payload: &str) -> anyhow::Result<()> {
            anyhow::bail!("broker unreachable")
        }
    }

    fn opener_with(
        bus: Box<dyn CommandBus>,
        timeout: Duration,
    ) -> (BusOpener, watch::Sender<DoorTelemetry>) {
        let (tx, rx) = telemetry_channel();
        let opener = BusOpener::new("main", "home/garage/main", ratgdo_commands(), timeout, bus, rx);
        (opener, tx)
    }

    fn telemetry(door_state: &str) -> DoorTelemetry {
        DoorTelemetry {
            door_state: door_state.into(),
            availability: "online".into(),
            obstruction: "clear".into(),
        }
    }

    #[tokio::test]
    async fn skips_command_when_start_state_does_not_match() {
        let (opener, tx) = opener_with(Box::new(RejectingBus), Duration::from_millis(100));
        tx.send(telemetry("open")).unwrap();

        // open requires start state `closed`; door is already open
        opener.set_state(Action::Open).await.unwrap();
    }

    #[tokio::test]
    async fn publishes_and_waits_for_stop_state() {
        let (tx, rx) = telemetry_channel();
        let bus = Box::<RecordingBus>::default();
        let opener = BusOpener::new(
            "main",
            "home/garage/main",
            ratgdo_commands(),
            Duration::from_secs(1),
            bus,
            rx,
        );
        tx.send(telemetry("open")).unwrap();

        let driver = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(telemetry("closing")).unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(telemetry("closed")).unwrap();
            tx
        });

        opener.set_state(Action::Close).await.unwrap();
        driver.await.unwrap();
    }

    #[tokio::test]
    async fn timeout_reports_obstruction_hint() {
        let (opener, tx) = opener_with(Box::<RecordingBus>::default(), Duration::from_millis(50));
        tx.send(DoorTelemetry {
            door_state: "open".into(),
            availability: "online".into(),
            obstruction: "obstructed".into(),
        })
        .unwrap();

        let err = opener.set_state(Action::Close).await.unwrap_err();
        match err {
            OpenerError::Timeout { hint, .. } => assert_eq!(hint, StatusHint::Obstructed),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn timeout_reports_offline_hint() {
        let (opener, tx) = opener_with(Box::<RecordingBus>::default(), Duration::from_millis(50));
        tx.send(DoorTelemetry {
            door_state: "closed".into(),
            availability: "offline".into(),
            obstruction: "clear".into(),
        })
        .unwrap();

        let err = opener.set_state(Action::Open).await.unwrap_err();
        match err {
            OpenerError::Timeout { hint, last_state, .. } => {
                assert_eq!(hint, StatusHint::Offline);
                assert_eq!(last_state, "closed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn send_failure_surfaces_as_send_error() {
        let (opener, tx) = opener_with(Box::new(FailingBus), Duration::from_millis(50));
        tx.send(telemetry("closed")).unwrap();

        let err = opener.set_state(Action::Open).await.unwrap_err();
        assert!(matches!(err, OpenerError::Send { action: Action::Open, .. }));
    }

    #[tokio::test]
    async fn unknown_action_name_is_rejected() {
        let (tx, rx) = telemetry_channel();
        let opener = BusOpener::new(
            "main",
            "home/garage/main",
            vec![],
            Duration::from_millis(50),
            Box::<RecordingBus>::default(),
            rx,
        );
        drop(tx);

        let err = opener.set_state(Action::Open).await.unwrap_err();
        assert!(matches!(err, OpenerError::NoCommand(Action::Open)));
    }

    #[tokio::test]
    async fn per_command_timeout_overrides_the_opener_default() {
        let (tx, rx) = telemetry_channel();
        let commands = vec![
            BusCommand {
                name: "open".into(),
                payload: "open".into(),
                topic_suffix: "command/door".into(),
                required_stop_state: "open".into(),
                // generous override, the opener default is far too short
                timeout_secs: Some(2),
                ..Default::default()
            },
            BusCommand {
                name: "close".into(),
                payload: "close".into(),
                topic_suffix: "command/door".into(),
                required_stop_state: "closed".into(),
                ..Default::default()
            },
        ];
        let opener = BusOpener::new(
            "main",
            "home/garage/main",
            commands,
            Duration::from_millis(50),
            Box::<RecordingBus>::default(),
            rx,
        );
        tx.send(telemetry("unknown")).unwrap();

        // door reaches any target state only after the opener default has
        // long expired
        let driver = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            tx.send(telemetry("open")).unwrap();
            tx
        });

        // open carries its own 2 s budget and sees the state change
        opener.set_state(Action::Open).await.unwrap();
        let tx = driver.await.unwrap();

        // close falls back to the 50 ms opener default and gives up before
        // the door reports anything new
        let driver = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = tx.send(telemetry("closed"));
        });
        let err = opener.set_state(Action::Close).await.unwrap_err();
        assert!(matches!(err, OpenerError::Timeout { .. }));
        driver.await.unwrap();
    }

    #[tokio::test]
    async fn fire_and_forget_without_stop_state() {
        let (tx, rx) = telemetry_channel();
        let commands = vec![BusCommand {
            name: "open".into(),
            payload: "up".into(),
            topic_suffix: "cmd".into(),
            ..Default::default()
        }];
        let opener = BusOpener::new(
            "side",
            "home/garage/side",
            commands,
            Duration::from_millis(50),
            Box::<RecordingBus>::default(),
            rx,
        );
        drop(tx);

        opener.set_state(Action::Open).await.unwrap();
    }
}

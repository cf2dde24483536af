//! Opener adapter for message-bus door controllers.
//!
//! The adapter publishes command payloads through a [`CommandBus`] port and
//! watches a [`DoorTelemetry`] feed for the resulting state change. The bus
//! connection itself (broker, reconnects, subscriptions) lives outside this
//! crate; anything that can deliver a payload to a topic string can drive a
//! door.

mod loopback;
mod opener;
mod ratgdo;

pub use loopback::LoopbackBus;
pub use opener::{BusCommand, BusOpener, CommandBus, DEFAULT_STATUS_TIMEOUT};
pub use ratgdo::{ratgdo_commands, RatgdoTopics};

use tokio::sync::watch;

/// Last-known controller status, merged from the controller's status topics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoorTelemetry {
    /// Door position as reported, e.g. `open`, `closed`, `opening`.
    pub door_state: String,
    /// Controller availability, `online` or `offline`.
    pub availability: String,
    /// Obstruction sensor, `obstructed` or `clear`.
    pub obstruction: String,
}

impl DoorTelemetry {
    pub fn is_offline(&self) -> bool {
        self.availability == "offline"
    }

    pub fn is_obstructed(&self) -> bool {
        self.obstruction == "obstructed"
    }
}

/// Handle pair for a door's status feed. The transport side keeps the
/// sender and merges incoming status messages into it; the opener holds the
/// receiver.
pub fn telemetry_channel() -> (watch::Sender<DoorTelemetry>, watch::Receiver<DoorTelemetry>) {
    watch::channel(DoorTelemetry::default())
}

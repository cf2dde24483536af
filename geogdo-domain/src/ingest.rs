//! Telemetry feed demultiplexing.
//!
//! The tracker publishes one topic per field per vehicle:
//!
//! ```text
//! <prefix>/cars/<tracker id>/latitude    "46.1925"
//! <prefix>/cars/<tracker id>/longitude   "-123.8008"
//! <prefix>/cars/<tracker id>/geofence    "home"
//! ```
//!
//! Messages are routed to a per-vehicle worker task over an mpsc channel.
//! The worker owns its [`Vehicle`] state outright, so updates for one
//! vehicle are applied strictly in arrival order with no locking.

use std::collections::HashMap;

use geogdo_types::VehicleUpdate;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::coordinator;
use crate::evaluator::apply_update;
use crate::fleet::Vehicle;

/// Depth of each per-vehicle update queue. Trackers publish at most a few
/// messages a second, so a small buffer only has to absorb bursts.
const WORKER_QUEUE: usize = 32;

/// Parse one raw feed message into a tracker id and update.
///
/// Returns `None` for topics outside the scheme and for unparseable
/// payloads.
pub fn parse_topic(prefix: &str, topic: &str, payload: &str) -> Option<(u64, VehicleUpdate)> {
    let rest = topic.strip_prefix(prefix)?.strip_prefix('/')?;
    let mut parts = rest.split('/');
    if parts.next()? != "cars" {
        return None;
    }
    let tracker_id: u64 = parts.next()?.parse().ok()?;
    let field = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let update = match field {
        "latitude" => VehicleUpdate::Latitude(parse_coord(topic, payload)?),
        "longitude" => VehicleUpdate::Longitude(parse_coord(topic, payload)?),
        "geofence" => VehicleUpdate::Zone(payload.trim().to_string()),
        _ => return None,
    };
    Some((tracker_id, update))
}

fn parse_coord(topic: &str, payload: &str) -> Option<f64> {
    match payload.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(%topic, %payload, "discarding unparseable coordinate");
            None
        }
    }
}

/// Routes parsed updates to vehicle workers by tracker id.
pub struct Dispatcher {
    prefix: String,
    workers: HashMap<u64, mpsc::Sender<VehicleUpdate>>,
}

impl Dispatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            workers: HashMap::new(),
        }
    }

    /// Spawn a worker owning `vehicle` and register it under its tracker
    /// id. Returns the worker task for shutdown joins.
    pub fn add_vehicle(&mut self, vehicle: Vehicle) -> JoinHandle<()> {
        let (tx, rx) = mpsc::channel(WORKER_QUEUE);
        let tracker_id = vehicle.tracker_id;
        let handle = spawn_worker(vehicle, rx);
        self.workers.insert(tracker_id, tx);
        handle
    }

    /// Feed one raw message through the demux. Unknown topics and unknown
    /// trackers are dropped quietly.
    pub async fn dispatch(&self, topic: &str, payload: &str) {
        let Some((tracker_id, update)) = parse_topic(&self.prefix, topic, payload) else {
            debug!(%topic, "ignoring message outside the telemetry scheme");
            return;
        };
        let Some(tx) = self.workers.get(&tracker_id) else {
            debug!(tracker = tracker_id, "no vehicle registered for tracker");
            return;
        };
        if tx.send(update).await.is_err() {
            warn!(tracker = tracker_id, "vehicle worker stopped, dropping update");
        }
    }
}

fn spawn_worker(mut vehicle: Vehicle, mut rx: mpsc::Receiver<VehicleUpdate>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            debug!(
                tracker = vehicle.tracker_id,
                kind = update.kind(),
                "applying telemetry update"
            );
            if let Some(action) = apply_update(&mut vehicle, update) {
                coordinator::trigger(&vehicle.door, action);
            }
        }
        debug!(tracker = vehicle.tracker_id, "telemetry feed closed, worker exiting");
    })
}

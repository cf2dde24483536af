//! Telemetry updates emitted by the tracker feed.

use serde::{Deserialize, Serialize};

/// One field of a vehicle's telemetry. Trackers publish latitude, longitude
/// and zone membership as independent messages, so updates arrive one field
/// at a time and are merged into the vehicle's current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum VehicleUpdate {
    Latitude(f64),
    Longitude(f64),
    Zone(String),
}

impl VehicleUpdate {
    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            VehicleUpdate::Latitude(_) => "latitude",
            VehicleUpdate::Longitude(_) => "longitude",
            VehicleUpdate::Zone(_) => "zone",
        }
    }
}

//! Shared data model for the geogdo workspace.
//!
//! These types cross crate boundaries (config file, domain engine, opener
//! adapters), so keep changes conservative: prefer adding optional fields
//! over changing semantics.

pub mod geofence;
pub mod update;

pub use geofence::{CircularGeofence, GeofenceSpec, PolygonGeofence, ZoneGeofence, ZoneTrigger};
pub use update::VehicleUpdate;

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// `(0, 0)` is valid WGS84 but sits in the open ocean; trackers report it
    /// before the first real fix, so it is treated as "no position yet".
    pub fn is_defined(&self) -> bool {
        self.lat != 0.0 && self.lng != 0.0
    }
}

/// A door operation requested by the geofence engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Open,
    Close,
}

impl Action {
    /// Wire/config spelling of the action, matching opener command names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Open => "open",
            Action::Close => "close",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Geofence definitions.
//!
//! A door is guarded by exactly one geofence model. The config file allows
//! any of the three tables to appear; resolution into a single
//! [`GeofenceSpec`] (and the priority between them) happens in
//! `geogdo-config`.

use serde::{Deserialize, Serialize};

use crate::Point;

/// Resolved geofence for a door. Exactly one variant is active.
#[derive(Debug, Clone, PartialEq)]
pub enum GeofenceSpec {
    Circular(CircularGeofence),
    Zone(ZoneGeofence),
    Polygon(PolygonGeofence),
}

/// A center point with two radii. Crossing outward over `close_distance`
/// closes the door; crossing inward under `open_distance` opens it.
/// Distances are meters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircularGeofence {
    pub center: Point,
    #[serde(default)]
    pub close_distance: f64,
    #[serde(default)]
    pub open_distance: f64,
}

/// A named-zone transition, e.g. leaving the tracker-defined `home` zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneTrigger {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
}

impl ZoneTrigger {
    pub fn is_defined(&self) -> bool {
        !self.from.is_empty() && !self.to.is_empty()
    }

    pub fn matches(&self, from: &str, to: &str) -> bool {
        self.is_defined() && self.from == from && self.to == to
    }
}

/// Open/close triggers over zone labels published by the tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneGeofence {
    #[serde(default, rename = "close_trigger")]
    pub close: ZoneTrigger,
    #[serde(default, rename = "open_trigger")]
    pub open: ZoneTrigger,
}

/// Two polygon rings. Leaving the close ring closes the door; entering the
/// open ring opens it. Rings are simple (no holes, no self-intersection).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolygonGeofence {
    #[serde(default)]
    pub close: Vec<Point>,
    #[serde(default)]
    pub open: Vec<Point>,
}

impl CircularGeofence {
    pub fn is_defined(&self) -> bool {
        self.center.is_defined() && (self.close_distance > 0.0 || self.open_distance > 0.0)
    }
}

impl ZoneGeofence {
    pub fn is_defined(&self) -> bool {
        self.close.is_defined() || self.open.is_defined()
    }
}

impl PolygonGeofence {
    pub fn is_defined(&self) -> bool {
        !self.close.is_empty() || !self.open.is_empty()
    }
}

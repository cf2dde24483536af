//! Doors and the vehicles assigned to them.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use geogdo_opener_api::Opener;
use geogdo_types::{GeofenceSpec, Point};

/// One garage door: its geofence, its opener and its operation policy.
///
/// Immutable after construction except for the operation lock, so it is
/// shared as `Arc<Door>` between every vehicle assigned to it.
pub struct Door {
    pub id: String,
    pub geofence: GeofenceSpec,
    pub opener: Box<dyn Opener>,
    /// Held after an operation finishes before new triggers are accepted.
    pub cooldown: Duration,
    /// Attempts per operation before giving up.
    pub max_retries: u32,
    pub(crate) op_lock: AtomicBool,
}

impl Door {
    pub fn new(
        id: impl Into<String>,
        geofence: GeofenceSpec,
        opener: Box<dyn Opener>,
        cooldown: Duration,
        max_retries: u32,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            geofence,
            opener,
            cooldown,
            max_retries,
            op_lock: AtomicBool::new(false),
        })
    }
}

impl std::fmt::Debug for Door {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Door")
            .field("id", &self.id)
            .field("opener", &self.opener.name())
            .field("cooldown", &self.cooldown)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

/// Mutable tracking state for one vehicle. Owned by that vehicle's worker
/// task, so no locking is needed.
#[derive(Debug)]
pub struct Vehicle {
    pub tracker_id: u64,
    pub door: Arc<Door>,
    pub location: Point,
    /// Distance to the circular geofence center at the last evaluation,
    /// meters.
    pub distance: f64,
    pub prev_zone: String,
    pub cur_zone: String,
    pub inside_close_ring: bool,
    pub inside_open_ring: bool,
}

impl Vehicle {
    /// `assume_at_home` seeds the state as if the vehicle is parked inside
    /// every fence, so a feed that starts mid-stream cannot fire a spurious
    /// open on its first message.
    pub fn new(tracker_id: u64, door: Arc<Door>, assume_at_home: bool) -> Self {
        Self {
            tracker_id,
            door,
            location: Point::default(),
            distance: if assume_at_home { 0.0 } else { f64::MAX },
            prev_zone: String::new(),
            cur_zone: if assume_at_home {
                "home".to_string()
            } else {
                String::new()
            },
            inside_close_ring: assume_at_home,
            inside_open_ring: assume_at_home,
        }
    }
}

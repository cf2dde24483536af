//! Edge-triggered geofence evaluation.
//!
//! Every function compares the vehicle's previous state with the state
//! implied by the newest update and emits an action only on a boundary
//! crossing. Sitting still inside or outside a fence never fires; neither
//! does re-seeing the same side of a boundary twice.

use geogdo_geo::{distance_meters, is_inside_polygon};
use geogdo_types::{
    Action, CircularGeofence, GeofenceSpec, PolygonGeofence, VehicleUpdate, ZoneGeofence,
};
use tracing::debug;

use crate::fleet::Vehicle;

/// Merge one telemetry update into the vehicle and evaluate its door's
/// geofence. Position fields merge independently; evaluation runs only
/// when the update is relevant to the fence type and the merged state is
/// complete.
pub fn apply_update(vehicle: &mut Vehicle, update: VehicleUpdate) -> Option<Action> {
    let door = vehicle.door.clone();
    match update {
        VehicleUpdate::Latitude(lat) => {
            vehicle.location.lat = lat;
            evaluate_position(vehicle, &door.geofence)
        }
        VehicleUpdate::Longitude(lng) => {
            vehicle.location.lng = lng;
            evaluate_position(vehicle, &door.geofence)
        }
        VehicleUpdate::Zone(zone) => {
            vehicle.prev_zone = std::mem::replace(&mut vehicle.cur_zone, zone);
            evaluate_zone(vehicle, &door.geofence)
        }
    }
}

fn evaluate_position(vehicle: &mut Vehicle, fence: &GeofenceSpec) -> Option<Action> {
    if !vehicle.location.is_defined() {
        return None;
    }
    match fence {
        GeofenceSpec::Circular(c) => circular_crossing(vehicle, c),
        GeofenceSpec::Polygon(p) => polygon_crossing(vehicle, p),
        GeofenceSpec::Zone(_) => None,
    }
}

fn evaluate_zone(vehicle: &mut Vehicle, fence: &GeofenceSpec) -> Option<Action> {
    match fence {
        GeofenceSpec::Zone(z) => zone_crossing(vehicle, z),
        _ => None,
    }
}

/// Distance-threshold crossings. The close and open radii are checked
/// independently so a fence can be close-only or open-only.
fn circular_crossing(vehicle: &mut Vehicle, fence: &CircularGeofence) -> Option<Action> {
    let prev = vehicle.distance;
    let cur = distance_meters(vehicle.location, fence.center);
    vehicle.distance = cur;

    debug!(
        tracker = vehicle.tracker_id,
        prev_m = prev,
        cur_m = cur,
        "distance to geofence center"
    );

    if fence.close_distance > 0.0 && prev <= fence.close_distance && cur > fence.close_distance {
        Some(Action::Close)
    } else if fence.open_distance > 0.0 && prev >= fence.open_distance && cur < fence.open_distance
    {
        Some(Action::Open)
    } else {
        None
    }
}

/// Named-zone transitions reported by the tracker itself.
fn zone_crossing(vehicle: &Vehicle, fence: &ZoneGeofence) -> Option<Action> {
    if fence.close.matches(&vehicle.prev_zone, &vehicle.cur_zone) {
        Some(Action::Close)
    } else if fence.open.matches(&vehicle.prev_zone, &vehicle.cur_zone) {
        Some(Action::Open)
    } else {
        None
    }
}

/// Ring containment edges. Leaving the close ring closes; entering the
/// open ring opens. Both flags are refreshed on every fix regardless of
/// whether an action fires.
fn polygon_crossing(vehicle: &mut Vehicle, fence: &PolygonGeofence) -> Option<Action> {
    let inside_close = is_inside_polygon(vehicle.location, &fence.close);
    let inside_open = is_inside_polygon(vehicle.location, &fence.open);

    let action = if !fence.close.is_empty() && vehicle.inside_close_ring && !inside_close {
        Some(Action::Close)
    } else if !fence.open.is_empty() && !vehicle.inside_open_ring && inside_open {
        Some(Action::Open)
    } else {
        None
    };

    vehicle.inside_close_ring = inside_close;
    vehicle.inside_open_ring = inside_open;
    action
}

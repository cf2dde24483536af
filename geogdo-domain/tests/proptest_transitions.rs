//! Property tests for geofence edge-triggering.

use std::time::Duration;

use geogdo_domain::evaluator::apply_update;
use geogdo_domain::{Door, Vehicle};
use geogdo_opener_api::NoopOpener;
use geogdo_types::{
    Action, CircularGeofence, GeofenceSpec, Point, VehicleUpdate, ZoneGeofence, ZoneTrigger,
};
use proptest::prelude::*;

const CENTER: Point = Point { lat: 46.1925, lng: -123.8008 };
const OPEN_M: f64 = 100.0;
const CLOSE_M: f64 = 200.0;

/// Meters of northward offset to degrees of latitude.
fn lat_at_offset(meters: f64) -> f64 {
    CENTER.lat + meters / 111_195.0
}

fn circular_vehicle() -> Vehicle {
    let door = Door::new(
        "main",
        GeofenceSpec::Circular(CircularGeofence {
            center: CENTER,
            close_distance: CLOSE_M,
            open_distance: OPEN_M,
        }),
        Box::new(NoopOpener::new()),
        Duration::ZERO,
        1,
    );
    Vehicle::new(1, door, true)
}

proptest! {
    /// Whatever path the vehicle takes, an open only ever fires strictly
    /// inside the open radius and a close strictly outside the close
    /// radius.
    #[test]
    fn actions_fire_on_the_correct_side_of_their_radius(
        offsets in prop::collection::vec(1.0f64..400.0, 1..40),
    ) {
        let mut vehicle = circular_vehicle();
        // establish a defined fix before the walk
        apply_update(&mut vehicle, VehicleUpdate::Longitude(CENTER.lng));
        apply_update(&mut vehicle, VehicleUpdate::Latitude(lat_at_offset(1.0)));

        for offset in offsets {
            let action = apply_update(&mut vehicle, VehicleUpdate::Latitude(lat_at_offset(offset)));
            match action {
                Some(Action::Open) => prop_assert!(vehicle.distance < OPEN_M),
                Some(Action::Close) => prop_assert!(vehicle.distance > CLOSE_M),
                None => {}
            }
        }
    }

    /// Distances inside the hysteresis band never fire on their own: an
    /// action requires crossing one of the two thresholds.
    #[test]
    fn dwelling_in_the_band_is_quiet(
        offsets in prop::collection::vec(110.0f64..190.0, 1..40),
    ) {
        let mut vehicle = circular_vehicle();
        apply_update(&mut vehicle, VehicleUpdate::Longitude(CENTER.lng));
        // walk into the band once; at most one action from the entry
        apply_update(&mut vehicle, VehicleUpdate::Latitude(lat_at_offset(150.0)));

        for offset in offsets {
            let action = apply_update(&mut vehicle, VehicleUpdate::Latitude(lat_at_offset(offset)));
            prop_assert_eq!(action, None);
        }
    }

    /// Zone fences only ever react to their exact configured label pairs.
    #[test]
    fn zone_actions_require_the_configured_pair(
        labels in prop::collection::vec("[a-c]{1,2}", 1..30),
    ) {
        let door = Door::new(
            "main",
            GeofenceSpec::Zone(ZoneGeofence {
                close: ZoneTrigger { from: "a".into(), to: "b".into() },
                open: ZoneTrigger { from: "b".into(), to: "a".into() },
            }),
            Box::new(NoopOpener::new()),
            Duration::ZERO,
            1,
        );
        let mut vehicle = Vehicle::new(1, door, false);

        for label in labels {
            let prev = vehicle.cur_zone.clone();
            let action = apply_update(&mut vehicle, VehicleUpdate::Zone(label.clone()));
            match action {
                Some(Action::Close) => prop_assert!(prev == "a" && label == "b"),
                Some(Action::Open) => prop_assert!(prev == "b" && label == "a"),
                None => prop_assert!(
                    !(prev == "a" && label == "b") && !(prev == "b" && label == "a")
                ),
            }
        }
    }
}

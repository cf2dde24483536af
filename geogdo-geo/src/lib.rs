//! Geometry primitives for geofence evaluation.
//!
//! Pure functions over [`Point`]; no state and no I/O. The domain engine
//! decides what a distance or containment result means for a door.

use geogdo_types::Point;

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371.0 * 1_000.0;

/// Great-circle distance between two points in meters, by the haversine
/// formula. Accurate to well under a meter at garage-door scales.
pub fn distance_meters(a: Point, b: Point) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Even-odd ray-casting containment test. Assumes a simple ring (no holes,
/// no self-intersection); the ring need not repeat its first point. Points
/// exactly on an edge may land on either side, which is fine at GPS
/// accuracy.
pub fn is_inside_polygon(p: Point, ring: &[Point]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (vi, vj) = (ring[i], ring[j]);
        if (vi.lat > p.lat) != (vj.lat > p.lat)
            && p.lng < (vj.lng - vi.lng) * (p.lat - vi.lat) / (vj.lat - vi.lat) + vi.lng
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

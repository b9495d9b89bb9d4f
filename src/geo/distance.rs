// src/geo/distance.rs
//! Haversine distance between positions

use super::Position;

/// Mean Earth radius used for all distance math.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres between two positions.
pub fn segment_km(from: Position, to: Position) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + from.lat.to_radians().cos() * to.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Total length of a path, summing consecutive segments.
pub fn path_km(path: &[Position]) -> f64 {
    path.windows(2).map(|pair| segment_km(pair[0], pair[1])).sum()
}

//! Great-circle distance and travel-time estimation.
//!
//! Used by the nearest-neighbor route fallback. Less accurate than road
//! network routing (ignores roads) but always available.

use crate::model::LatLng;

/// Average driving speed assumption for time estimation.
pub const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points in kilometers.
pub fn haversine_km(from: LatLng, to: LatLng) -> f64 {
    let (lat1, lng1) = from;
    let (lat2, lng2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Travel time in minutes for a distance at an assumed average speed.
pub fn travel_minutes(km: f64, speed_kmh: f64) -> f64 {
    (km / speed_kmh) * 60.0
}

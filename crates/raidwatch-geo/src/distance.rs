//! Great-circle distance and point-set helpers.
//!
//! Uses the haversine formula on a spherical Earth (R = 6371 km).
//! Accurate to ~0.5% which is plenty for deciding what to frame on a map.

use glam::DVec2;

use raidwatch_core::constants::EARTH_RADIUS_KM;
use raidwatch_core::types::GeoPoint;

/// Great-circle distance between two points in kilometers.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Arithmetic mean of the points in degree space. `None` for an empty set.
pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(DVec2::ZERO, |acc, p| acc + DVec2::new(p.lon, p.lat));
    let mean = sum / points.len() as f64;
    Some(GeoPoint::new(mean.x, mean.y))
}

/// Componentwise (min, max) corners of the points. `None` for an empty set.
pub fn extent(points: &[GeoPoint]) -> Option<(DVec2, DVec2)> {
    let first = points.first()?;
    let start = DVec2::new(first.lon, first.lat);
    Some(points.iter().fold((start, start), |(min, max), p| {
        let v = DVec2::new(p.lon, p.lat);
        (min.min(v), max.max(v))
    }))
}

//! Fundamental geographic types.

use serde::{Deserialize, Serialize};

/// A point on the map in WGS84 degrees.
///
/// Field order follows the `[lon, lat]` convention of web map providers,
/// so `GeoPoint::new(30.0, 50.0)` is longitude 30, latitude 50.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

/// Axis-aligned geographic box (degrees).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Shift by a raw degree offset. Not geodesic; only meaningful for
    /// small offsets away from the poles.
    pub fn offset(&self, d_lon: f64, d_lat: f64) -> Self {
        Self {
            lon: self.lon + d_lon,
            lat: self.lat + d_lat,
        }
    }
}

impl Bounds {
    /// Longitude span in degrees.
    pub fn lon_span(&self) -> f64 {
        self.east - self.west
    }

    /// Latitude span in degrees.
    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    /// Whether the point lies inside the box (edges inclusive).
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lon >= self.west
            && point.lon <= self.east
            && point.lat >= self.south
            && point.lat <= self.north
    }

    /// Center of the box.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.west + self.east) / 2.0,
            (self.south + self.north) / 2.0,
        )
    }
}

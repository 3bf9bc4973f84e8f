//! Camera framing for a set of plottable objects.
//!
//! Framing prefers specific places over regions: a box around two towns is
//! more useful than one stretched over whole oblasts. Points far from the
//! centroid of the chosen set are dropped so one stray launch site does not
//! zoom the map out to half the continent.

use glam::DVec2;
use tracing::debug;

use raidwatch_core::constants::*;
use raidwatch_core::state::{MapView, PlottableObject};
use raidwatch_core::types::{Bounds, GeoPoint};

use crate::distance::{centroid, extent, haversine_km};
use crate::region::is_regional;

/// Framing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    /// Points at least this far from the centroid are dropped (km).
    pub outlier_km: f64,
    /// Spans narrower than this get `min_padding_deg` (degrees).
    pub point_span_deg: f64,
    pub min_padding_deg: f64,
    /// Padding for wider spans, as a fraction of the span.
    pub padding_fraction: f64,
    pub default_center: GeoPoint,
    pub default_zoom: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            outlier_km: OUTLIER_DISTANCE_KM,
            point_span_deg: POINT_SPAN_DEG,
            min_padding_deg: MIN_PADDING_DEG,
            padding_fraction: PADDING_FRACTION,
            default_center: GeoPoint::new(DEFAULT_CENTER.0, DEFAULT_CENTER.1),
            default_zoom: DEFAULT_ZOOM,
        }
    }
}

/// Computes the viewport for a rendering pass.
#[derive(Debug, Clone, Default)]
pub struct ViewComputer {
    config: ViewConfig,
}

impl ViewComputer {
    pub fn new(config: ViewConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Frame `objects`. An empty slice frames the default center.
    pub fn compute_view(&self, objects: &[PlottableObject]) -> MapView {
        let points = framing_points(objects);
        let kept = self.drop_outliers(&points);

        let (min, max) = extent(&kept).unwrap_or_else(|| {
            let c = self.config.default_center;
            let v = DVec2::new(c.lon, c.lat);
            (v, v)
        });
        let pad = DVec2::new(
            self.padding(max.x - min.x),
            self.padding(max.y - min.y),
        );
        let (min, max) = (min - pad, max + pad);

        debug!(
            points = points.len(),
            kept = kept.len(),
            west = min.x,
            south = min.y,
            east = max.x,
            north = max.y,
            "Computed map view"
        );

        MapView {
            bounds: Bounds {
                west: min.x,
                south: min.y,
                east: max.x,
                north: max.y,
            },
            center: self.config.default_center,
            zoom: self.config.default_zoom,
        }
    }

    /// Keep points closer than `outlier_km` to the centroid. If none
    /// survive, keep only the first point.
    fn drop_outliers(&self, points: &[GeoPoint]) -> Vec<GeoPoint> {
        let Some(center) = centroid(points) else {
            return Vec::new();
        };
        let kept: Vec<GeoPoint> = points
            .iter()
            .copied()
            .filter(|p| haversine_km(&center, p) < self.config.outlier_km)
            .collect();
        if kept.is_empty() {
            points.first().copied().into_iter().collect()
        } else {
            kept
        }
    }

    fn padding(&self, span: f64) -> f64 {
        if span < self.config.point_span_deg {
            self.config.min_padding_deg
        } else {
            span * self.config.padding_fraction
        }
    }
}

/// Points used for framing: the specific ("core") endpoints when there are
/// at least two of them, otherwise every endpoint.
pub fn framing_points(objects: &[PlottableObject]) -> Vec<GeoPoint> {
    let mut core = Vec::new();
    let mut all = Vec::with_capacity(objects.len() * 2);
    for obj in objects {
        let group = &obj.group;
        all.push(obj.origin_coords);
        all.push(obj.destination_coords);
        if !is_regional(&group.origin) {
            core.push(obj.origin_coords);
        }
        // A static group's destination is its origin; count it once.
        if !is_regional(&group.destination) && group.destination != group.origin {
            core.push(obj.destination_coords);
        }
    }
    if core.len() > 1 {
        core
    } else {
        all
    }
}

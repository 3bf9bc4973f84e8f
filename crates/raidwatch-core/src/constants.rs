//! Tracker constants and tuning parameters.

use crate::enums::Category;

// --- State ---

/// Idle period after which every tracked group is considered landed (1 hour).
pub const DEFAULT_EXPIRY_SECS: u64 = 60 * 60;

/// Category whose multi-event `continue` batches restate the full picture.
pub const SUMMARY_CATEGORY: Category = Category::Shahed;

/// Minimum number of `continue` events for a batch to count as a summary.
pub const SUMMARY_MIN_EVENTS: usize = 2;

/// Number of recently processed report ids remembered for de-duplication.
pub const RECENT_REPORT_WINDOW: usize = 200;

// --- Geography ---

/// Mean Earth radius used by the haversine formula (km).
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Degree offset applied for N/S/E/W headings.
pub const CARDINAL_OFFSET_DEG: f64 = 1.5;

/// Per-axis degree offset applied for diagonal headings (~1.5 / sqrt 2).
pub const DIAGONAL_OFFSET_DEG: f64 = 1.06;

/// Points at least this far from the framing centroid are outliers (km).
pub const OUTLIER_DISTANCE_KM: f64 = 800.0;

/// Spans below this are treated as point-like (degrees).
pub const POINT_SPAN_DEG: f64 = 0.5;

/// Padding applied to point-like spans (degrees).
pub const MIN_PADDING_DEG: f64 = 1.5;

/// Padding applied to wider spans, as a fraction of the span.
pub const PADDING_FRACTION: f64 = 0.3;

/// Default map center (lon, lat): center of Ukraine.
pub const DEFAULT_CENTER: (f64, f64) = (31.16558, 48.379433);

/// Default map zoom.
pub const DEFAULT_ZOOM: f64 = 5.0;

// --- Geocoding ---

/// Language preference passed to the geocoding provider.
pub const GEOCODE_LANGUAGES: [&str; 3] = ["en", "uk", "ru"];

/// Country preference passed to the geocoding provider.
pub const GEOCODE_COUNTRIES: [&str; 2] = ["ua", "ru"];

//! Geospatial side of RAIDWATCH.
//!
//! Place-name geocoding, heading resolution, and map framing for the
//! tracked groups.

pub use raidwatch_core as core;

pub mod audit;
pub mod direction;
pub mod distance;
pub mod geocoder;
pub mod plot;
pub mod region;
pub mod view;

// Re-export key types for convenience.
pub use audit::{GeocodeAttempt, GeocodeAudit, JsonlAudit, TracingAudit};
pub use distance::haversine_km;
pub use geocoder::{GeocodeError, GeocodePass, GeocodingProvider, MapTilerProvider, PlaceLookup};
pub use plot::{plan_map, MapPlan};
pub use region::is_regional;
pub use view::{ViewComputer, ViewConfig};

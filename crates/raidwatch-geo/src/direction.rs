//! Heading resolution: turns a free-text heading into a destination point.
//!
//! Compass headings become a fixed degree offset from the origin. The
//! offsets are a flat-earth approximation tuned for the theater (roughly
//! 165 km north-south), not a geodesic projection. Anything else is treated
//! as a place name.

use tracing::{debug, warn};

use raidwatch_core::constants::{CARDINAL_OFFSET_DEG, DIAGONAL_OFFSET_DEG};
use raidwatch_core::types::GeoPoint;

use crate::geocoder::PlaceLookup;

/// Filler word stripped from headings ("towards Kyiv" → "kyiv").
const FILLER: &str = "towards";

/// Lowercase, drop whitespace and punctuation (hyphens kept), drop the
/// filler word once.
pub fn normalize_heading(heading: &str) -> String {
    let compact: String = heading
        .chars()
        .filter(|c| !c.is_whitespace() && !(c.is_ascii_punctuation() && *c != '-'))
        .flat_map(char::to_lowercase)
        .collect();
    compact.replacen(FILLER, "", 1)
}

/// `(d_lon, d_lat)` for a normalized compass token.
pub fn compass_offset(token: &str) -> Option<(f64, f64)> {
    let c = CARDINAL_OFFSET_DEG;
    let d = DIAGONAL_OFFSET_DEG;
    let offset = match token {
        "n" | "north" => (0.0, c),
        "s" | "south" => (0.0, -c),
        "e" | "east" => (c, 0.0),
        "w" | "west" => (-c, 0.0),
        "ne" | "northeast" | "north-east" => (d, d),
        "nw" | "northwest" | "north-west" => (-d, d),
        "se" | "southeast" | "south-east" => (d, -d),
        "sw" | "southwest" | "south-west" => (-d, -d),
        _ => return None,
    };
    Some(offset)
}

/// Destination implied by `heading` from `origin`.
///
/// Falls back to `origin` (a static marker) when the heading is neither a
/// compass token nor a place the lookup can resolve.
pub fn resolve(origin: GeoPoint, heading: &str, places: &dyn PlaceLookup) -> GeoPoint {
    let token = normalize_heading(heading);
    if let Some((d_lon, d_lat)) = compass_offset(&token) {
        debug!(heading, d_lon, d_lat, "Applied compass offset");
        return origin.offset(d_lon, d_lat);
    }
    match places.lookup(heading) {
        Some(target) => {
            debug!(heading, lon = target.lon, lat = target.lat, "Heading resolved as place");
            target
        }
        None => {
            warn!(heading, "Could not resolve heading; object will be static");
            origin
        }
    }
}

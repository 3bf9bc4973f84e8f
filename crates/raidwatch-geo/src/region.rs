//! Regional place detection.
//!
//! A place description is "regional" when it names an administrative area
//! or a compass qualifier rather than a specific town. Regional endpoints
//! are deprioritized when framing the map.

/// Vocabulary matched case-insensitively anywhere in the text.
const REGIONAL_TERMS: [&str; 11] = [
    "oblast", "region", "western", "southern", "northern", "eastern", "west", "south", "north",
    "east", "district",
];

/// Whether `place` reads as a broad region rather than a specific location.
pub fn is_regional(place: &str) -> bool {
    let lower = place.to_lowercase();
    REGIONAL_TERMS.iter().any(|term| lower.contains(term))
}

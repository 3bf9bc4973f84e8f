//! Tracked state: the active groups and the snapshot handed to consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::Category;
use crate::types::GeoPoint;

/// A tracked cluster of threats of one category heading to one destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveObjectGroup {
    pub id: Uuid,
    /// Always > 0 while the group is in the collection.
    pub quantity: u32,
    pub category: Category,
    pub origin: String,
    pub destination: String,
    /// Free-text heading token; `None` means static / unknown.
    #[serde(default)]
    pub heading: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ActiveObjectGroup {
    /// Create a group with a fresh id.
    pub fn new(
        quantity: u32,
        category: Category,
        origin: impl Into<String>,
        destination: impl Into<String>,
        heading: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            quantity,
            category,
            origin: origin.into(),
            destination: destination.into(),
            heading,
            updated_at: Utc::now(),
        }
    }
}

/// Read-only copy of the tracked groups, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub groups: Vec<ActiveObjectGroup>,
}

impl WorldState {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Total number of individual threats across all groups.
    pub fn total_quantity(&self) -> u64 {
        self.groups.iter().map(|g| u64::from(g.quantity)).sum()
    }
}

/// A group with both endpoints resolved to coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlottableObject {
    #[serde(flatten)]
    pub group: ActiveObjectGroup,
    pub origin_coords: GeoPoint,
    pub destination_coords: GeoPoint,
}

/// Camera framing computed for a rendering pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub bounds: crate::types::Bounds,
    /// Fallback center for consumers that do not use `bounds`.
    pub center: GeoPoint,
    pub zoom: f64,
}

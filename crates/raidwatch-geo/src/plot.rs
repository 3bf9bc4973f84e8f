//! Rendering-pass preparation: geocode the tracked groups, resolve
//! headings, and frame the result.

use tracing::{info, warn};

use raidwatch_core::state::{ActiveObjectGroup, MapView, PlottableObject};
use raidwatch_core::types::GeoPoint;

use crate::direction;
use crate::geocoder::GeocodePass;
use crate::view::ViewComputer;

/// Everything the renderer needs for one map.
#[derive(Debug, Clone)]
pub struct MapPlan {
    pub objects: Vec<PlottableObject>,
    pub view: MapView,
    /// Groups left out because an endpoint could not be resolved.
    pub unplottable: usize,
}

/// Resolve coordinates for every group. Groups with an unresolved endpoint
/// are left out.
pub fn resolve_objects(groups: &[ActiveObjectGroup], pass: &GeocodePass<'_>) -> Vec<PlottableObject> {
    let names = groups.iter().flat_map(|g| {
        let heading = g
            .heading
            .as_deref()
            .filter(|h| direction::compass_offset(&direction::normalize_heading(h)).is_none());
        [Some(g.origin.as_str()), Some(g.destination.as_str()), heading]
            .into_iter()
            .flatten()
    });
    pass.prefetch(names);

    groups
        .iter()
        .filter_map(|group| {
            let origin = pass.resolve(&group.origin);
            let mut destination = pass.resolve(&group.destination);
            if let (Some(from), Some(heading)) = (origin, group.heading.as_deref()) {
                destination = Some(direction::resolve(from, heading, pass));
            }
            plottable(group, origin, destination)
        })
        .collect()
}

fn plottable(
    group: &ActiveObjectGroup,
    origin: Option<GeoPoint>,
    destination: Option<GeoPoint>,
) -> Option<PlottableObject> {
    match (origin, destination) {
        (Some(origin_coords), Some(destination_coords)) => Some(PlottableObject {
            group: group.clone(),
            origin_coords,
            destination_coords,
        }),
        _ => {
            warn!(
                id = %group.id,
                origin = %group.origin,
                destination = %group.destination,
                "Group has an unresolved endpoint; skipping"
            );
            None
        }
    }
}

/// Build the map for `groups`. `None` when nothing can be plotted; that is
/// a "no map" outcome rather than an error.
pub fn plan_map(
    groups: &[ActiveObjectGroup],
    pass: &GeocodePass<'_>,
    view: &ViewComputer,
) -> Option<MapPlan> {
    if groups.is_empty() {
        info!(pass = pass.pass_id(), "No active groups; not generating a map");
        return None;
    }
    let objects = resolve_objects(groups, pass);
    if objects.is_empty() {
        warn!(pass = pass.pass_id(), "No plottable objects after geocoding; aborting map");
        return None;
    }
    let unplottable = groups.len() - objects.len();
    if unplottable > 0 {
        warn!(
            pass = pass.pass_id(),
            plotted = objects.len(),
            total = groups.len(),
            "Only part of the state could be plotted"
        );
    }
    let view = view.compute_view(&objects);
    Some(MapPlan {
        objects,
        view,
        unplottable,
    })
}

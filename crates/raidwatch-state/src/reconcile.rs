//! Reconciliation rules: how a classified event changes the tracked groups.
//!
//! Pure functions over a `Vec<ActiveObjectGroup>`; no I/O, no timers.
//! Matching is a linear scan in insertion order and only the first match
//! is touched, even when several groups share a destination.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use raidwatch_core::constants::{SUMMARY_CATEGORY, SUMMARY_MIN_EVENTS};
use raidwatch_core::enums::{BatchKind, Category};
use raidwatch_core::events::{AlarmReport, Event, GroupReport, LandedReport};
use raidwatch_core::state::ActiveObjectGroup;

/// What a single event did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Added,
    Updated,
    /// Quantity reduced; the group is still tracked.
    Reduced,
    Removed,
    /// `landed` found nothing to land.
    NoMatch,
    /// Missing category, origin, destination or location.
    Incomplete,
    Unrecognized,
}

/// Decide once per batch whether it is a full summary or a set of deltas.
///
/// A batch is a summary when it holds at least two events and every one of
/// them is a `continue` for the summary category.
pub fn classify_batch(events: &[Event]) -> BatchKind {
    let all_summary = events
        .iter()
        .all(|e| matches!(e, Event::Continue(r) if r.category == Some(SUMMARY_CATEGORY)));
    if all_summary && events.len() >= SUMMARY_MIN_EVENTS {
        BatchKind::Summary(SUMMARY_CATEGORY)
    } else {
        BatchKind::Incremental
    }
}

/// Drop every group of `category` and rebuild it from the summary events.
/// Returns the number of groups created.
pub fn replace_category(
    groups: &mut Vec<ActiveObjectGroup>,
    category: Category,
    events: &[Event],
    now: DateTime<Utc>,
) -> usize {
    let before = groups.len();
    groups.retain(|g| g.category != category);
    let dropped = before - groups.len();

    let mut created = 0;
    for event in events {
        let (Event::Launch(report) | Event::Continue(report)) = event else {
            continue;
        };
        match new_group(report, now) {
            Some(group) if group.category == category => {
                groups.push(group);
                created += 1;
            }
            _ => warn!(kind = event.kind_name(), "Skipping incomplete summary entry"),
        }
    }
    info!(%category, dropped, created, "Replaced groups from full summary");
    created
}

/// Apply one event against the current collection.
pub fn process_event(
    groups: &mut Vec<ActiveObjectGroup>,
    event: &Event,
    now: DateTime<Utc>,
) -> EventOutcome {
    match event {
        Event::Launch(report) => add_group(groups, report, now),
        Event::Continue(report) => match update_group(groups, report, now) {
            Some(outcome) => outcome,
            None => add_group(groups, report, now),
        },
        Event::Landed(report) => land_group(groups, report, now),
        Event::Alarm(report) => add_alarm(groups, report, now),
        Event::Unrecognized { kind } => {
            warn!(kind = %kind, "Unknown event type; ignoring");
            EventOutcome::Unrecognized
        }
    }
}

fn non_empty(text: &Option<String>) -> Option<&str> {
    text.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn new_group(report: &GroupReport, now: DateTime<Utc>) -> Option<ActiveObjectGroup> {
    let category = report.category?;
    let origin = non_empty(&report.origin)?;
    let destination = non_empty(&report.destination)?;
    let mut group = ActiveObjectGroup::new(
        report.quantity.unwrap_or(1),
        category,
        origin,
        destination,
        non_empty(&report.heading).map(str::to_string),
    );
    group.updated_at = now;
    Some(group)
}

fn add_group(
    groups: &mut Vec<ActiveObjectGroup>,
    report: &GroupReport,
    now: DateTime<Utc>,
) -> EventOutcome {
    let Some(group) = new_group(report, now) else {
        debug!(?report, "Ignoring event without category, origin or destination");
        return EventOutcome::Incomplete;
    };
    info!(
        quantity = group.quantity,
        category = %group.category,
        origin = %group.origin,
        destination = %group.destination,
        heading = group.heading.as_deref().unwrap_or("-"),
        "Added group"
    );
    groups.push(group);
    EventOutcome::Added
}

/// `None` when no group matches (caller falls back to creation).
fn update_group(
    groups: &mut [ActiveObjectGroup],
    report: &GroupReport,
    now: DateTime<Utc>,
) -> Option<EventOutcome> {
    let category = report.category?;
    let origin = non_empty(&report.origin)?;
    let destination = non_empty(&report.destination)?;

    let target = groups
        .iter_mut()
        .find(|g| g.category == category && g.destination == destination)?;
    let quantity = report.quantity.unwrap_or(1);
    info!(
        %category,
        destination,
        from = target.quantity,
        to = quantity,
        "Updated group"
    );
    target.quantity = quantity;
    target.origin = origin.to_string();
    target.heading = non_empty(&report.heading).map(str::to_string);
    target.updated_at = now;
    Some(EventOutcome::Updated)
}

fn land_group(
    groups: &mut Vec<ActiveObjectGroup>,
    report: &LandedReport,
    now: DateTime<Utc>,
) -> EventOutcome {
    let (Some(category), Some(location)) = (report.category, non_empty(&report.location)) else {
        debug!(?report, "Ignoring landed event without category or location");
        return EventOutcome::Incomplete;
    };
    let Some(index) = groups.iter().position(|g| {
        g.category == category && (g.destination == location || g.origin == location)
    }) else {
        warn!(%category, location, "Could not find group to land");
        return EventOutcome::NoMatch;
    };

    let target = &mut groups[index];
    let removed = report.quantity.unwrap_or(target.quantity);
    let remaining = target.quantity.saturating_sub(removed);
    info!(%category, location, removed, remaining, "Reduced group");
    if remaining == 0 {
        groups.remove(index);
        info!(%category, location, "Removed group");
        EventOutcome::Removed
    } else {
        target.quantity = remaining;
        target.updated_at = now;
        EventOutcome::Reduced
    }
}

fn add_alarm(
    groups: &mut Vec<ActiveObjectGroup>,
    report: &AlarmReport,
    now: DateTime<Utc>,
) -> EventOutcome {
    let as_group = GroupReport {
        quantity: report.quantity,
        category: report.category,
        origin: report.region.clone(),
        destination: report.region.clone(),
        heading: None,
    };
    add_group(groups, &as_group, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(quantity: Option<u32>, category: Category, origin: &str, destination: &str) -> GroupReport {
        GroupReport {
            quantity,
            category: Some(category),
            origin: Some(origin.into()),
            destination: Some(destination.into()),
            heading: None,
        }
    }

    fn launch(quantity: u32, category: Category, origin: &str, destination: &str) -> Event {
        Event::Launch(report(Some(quantity), category, origin, destination))
    }

    fn cont(quantity: u32, category: Category, origin: &str, destination: &str) -> Event {
        Event::Continue(report(Some(quantity), category, origin, destination))
    }

    fn landed(quantity: Option<u32>, category: Category, location: &str) -> Event {
        Event::Landed(LandedReport {
            quantity,
            category: Some(category),
            location: Some(location.into()),
        })
    }

    fn apply(groups: &mut Vec<ActiveObjectGroup>, events: &[Event]) -> Vec<EventOutcome> {
        let now = Utc::now();
        events.iter().map(|e| process_event(groups, e, now)).collect()
    }

    #[test]
    fn test_launch_distinct_pairs_one_group_each() {
        let mut groups = Vec::new();
        let events = [
            launch(4, Category::Shahed, "Khmelnytskyi Oblast", "Starokostiantyniv"),
            launch(3, Category::Shahed, "Cherkasy", "Smila"),
            launch(2, Category::Rocket, "Black Sea", "Odesa"),
        ];
        apply(&mut groups, &events);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].quantity, 4);
        assert_eq!(groups[1].destination, "Smila");
        assert_eq!(groups[2].category, Category::Rocket);
        assert_eq!(groups[2].origin, "Black Sea");
    }

    #[test]
    fn test_launch_defaults_quantity_and_skips_incomplete() {
        let mut groups = Vec::new();
        let outcomes = apply(
            &mut groups,
            &[
                Event::Launch(report(None, Category::Shahed, "a", "b")),
                Event::Launch(GroupReport {
                    origin: Some("a".into()),
                    destination: Some("b".into()),
                    ..Default::default()
                }),
                Event::Launch(report(Some(2), Category::Shahed, "  ", "b")),
            ],
        );
        assert_eq!(
            outcomes,
            vec![EventOutcome::Added, EventOutcome::Incomplete, EventOutcome::Incomplete]
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].quantity, 1);
    }

    #[test]
    fn test_continue_updates_in_place() {
        let mut groups = Vec::new();
        apply(&mut groups, &[launch(2, Category::Rocket, "Zaporizhzhia Oblast", "Dnipro")]);
        let id = groups[0].id;

        let mut update = report(Some(3), Category::Rocket, "Synelnykove", "Dnipro");
        update.heading = Some("north".into());
        let outcomes = apply(&mut groups, &[Event::Continue(update)]);

        assert_eq!(outcomes, vec![EventOutcome::Updated]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, id);
        assert_eq!(groups[0].quantity, 3);
        assert_eq!(groups[0].origin, "Synelnykove");
        assert_eq!(groups[0].destination, "Dnipro");
        assert_eq!(groups[0].heading.as_deref(), Some("north"));
    }

    #[test]
    fn test_continue_clears_heading_when_absent() {
        let mut groups = Vec::new();
        let mut first = report(Some(1), Category::Shahed, "a", "b");
        first.heading = Some("west".into());
        apply(&mut groups, &[Event::Launch(first)]);
        apply(&mut groups, &[cont(1, Category::Shahed, "a", "b")]);
        assert_eq!(groups[0].heading, None);
    }

    #[test]
    fn test_continue_without_match_is_launch() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        apply(&mut a, &[cont(5, Category::Shahed, "Sumy", "Poltava")]);
        apply(&mut b, &[launch(5, Category::Shahed, "Sumy", "Poltava")]);

        assert_eq!(a.len(), 1);
        assert_eq!(
            (a[0].quantity, a[0].category, &a[0].origin, &a[0].destination),
            (b[0].quantity, b[0].category, &b[0].origin, &b[0].destination)
        );
    }

    #[test]
    fn test_continue_matches_category_too() {
        let mut groups = Vec::new();
        apply(&mut groups, &[launch(2, Category::Rocket, "a", "Kyiv")]);
        apply(&mut groups, &[cont(6, Category::Shahed, "b", "Kyiv")]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].quantity, 2);
    }

    #[test]
    fn test_continue_touches_only_first_match() {
        let mut groups = Vec::new();
        apply(
            &mut groups,
            &[
                launch(1, Category::Shahed, "a", "Kyiv"),
                launch(1, Category::Shahed, "b", "Kyiv"),
            ],
        );
        apply(&mut groups, &[cont(9, Category::Shahed, "c", "Kyiv")]);
        assert_eq!(groups[0].quantity, 9);
        assert_eq!(groups[1].quantity, 1);
    }

    #[test]
    fn test_continue_sees_launch_from_same_batch() {
        let mut groups = Vec::new();
        apply(
            &mut groups,
            &[
                launch(2, Category::Shahed, "Sumy", "Kyiv"),
                cont(4, Category::Shahed, "Chernihiv", "Kyiv"),
            ],
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].quantity, 4);
    }

    #[test]
    fn test_landed_without_quantity_removes_group() {
        let mut groups = Vec::new();
        apply(&mut groups, &[launch(7, Category::Shahed, "a", "Lviv")]);
        let outcomes = apply(&mut groups, &[landed(None, Category::Shahed, "Lviv")]);
        assert_eq!(outcomes, vec![EventOutcome::Removed]);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_landed_partial_and_excess() {
        let mut groups = Vec::new();
        apply(&mut groups, &[launch(5, Category::Rocket, "a", "Kharkiv")]);

        let outcomes = apply(&mut groups, &[landed(Some(2), Category::Rocket, "Kharkiv")]);
        assert_eq!(outcomes, vec![EventOutcome::Reduced]);
        assert_eq!(groups[0].quantity, 3);

        let outcomes = apply(&mut groups, &[landed(Some(10), Category::Rocket, "Kharkiv")]);
        assert_eq!(outcomes, vec![EventOutcome::Removed]);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_partial_landing_touches_updated_at() {
        let mut groups = Vec::new();
        let launched_at = Utc::now() - chrono::Duration::minutes(10);
        process_event(&mut groups, &launch(5, Category::Shahed, "a", "Kyiv"), launched_at);

        let landed_at = Utc::now();
        let outcome = process_event(&mut groups, &landed(Some(2), Category::Shahed, "Kyiv"), landed_at);
        assert_eq!(outcome, EventOutcome::Reduced);
        assert_eq!(groups[0].quantity, 3);
        assert_eq!(groups[0].updated_at, landed_at);
    }

    #[test]
    fn test_landed_exact_quantity_removes() {
        let mut groups = Vec::new();
        apply(&mut groups, &[launch(3, Category::Rocket, "a", "Kharkiv")]);
        apply(&mut groups, &[landed(Some(3), Category::Rocket, "Kharkiv")]);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_landed_matches_origin() {
        let mut groups = Vec::new();
        apply(&mut groups, &[launch(2, Category::Shahed, "Bryansk", "Sumy")]);
        apply(&mut groups, &[landed(Some(1), Category::Shahed, "Bryansk")]);
        assert_eq!(groups[0].quantity, 1);
    }

    #[test]
    fn test_landed_without_match_is_non_fatal() {
        let mut groups = Vec::new();
        apply(&mut groups, &[launch(2, Category::Shahed, "a", "b")]);
        let outcomes = apply(
            &mut groups,
            &[
                landed(None, Category::Rocket, "b"),
                landed(None, Category::Shahed, "elsewhere"),
                Event::Landed(LandedReport::default()),
            ],
        );
        assert_eq!(
            outcomes,
            vec![EventOutcome::NoMatch, EventOutcome::NoMatch, EventOutcome::Incomplete]
        );
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_alarm_always_appends_static_group() {
        let mut groups = Vec::new();
        let alarm = Event::Alarm(AlarmReport {
            quantity: None,
            category: Some(Category::Rocket),
            region: Some("Kyiv Oblast".into()),
        });
        apply(&mut groups, &[alarm.clone(), alarm]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].origin, "Kyiv Oblast");
        assert_eq!(groups[0].destination, "Kyiv Oblast");
        assert_eq!(groups[0].quantity, 1);
        assert_ne!(groups[0].id, groups[1].id);
    }

    #[test]
    fn test_unrecognized_event_is_ignored() {
        let mut groups = Vec::new();
        let outcomes = apply(&mut groups, &[Event::Unrecognized { kind: "intercepted".into() }]);
        assert_eq!(outcomes, vec![EventOutcome::Unrecognized]);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_classify_summary_batches() {
        let summary = [
            cont(4, Category::Shahed, "a", "b"),
            cont(3, Category::Shahed, "c", "d"),
        ];
        assert_eq!(classify_batch(&summary), BatchKind::Summary(Category::Shahed));

        assert_eq!(classify_batch(&summary[..1]), BatchKind::Incremental);
        assert_eq!(classify_batch(&[]), BatchKind::Incremental);

        let mixed = [summary[0].clone(), launch(1, Category::Shahed, "x", "y")];
        assert_eq!(classify_batch(&mixed), BatchKind::Incremental);

        let rockets = [
            cont(1, Category::Rocket, "a", "b"),
            cont(1, Category::Rocket, "c", "d"),
        ];
        assert_eq!(classify_batch(&rockets), BatchKind::Incremental);
    }

    #[test]
    fn test_replace_category_keeps_other_categories() {
        let mut groups = Vec::new();
        apply(
            &mut groups,
            &[
                launch(5, Category::Shahed, "a", "Kyiv"),
                launch(2, Category::Rocket, "Black Sea", "Odesa"),
                launch(1, Category::Shahed, "b", "Lviv"),
            ],
        );
        let rocket_id = groups[1].id;

        let summary = [
            cont(4, Category::Shahed, "Cherkasy", "Kyiv"),
            cont(3, Category::Shahed, "Sumy", "Poltava"),
        ];
        let created = replace_category(&mut groups, Category::Shahed, &summary, Utc::now());

        assert_eq!(created, 2);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].id, rocket_id);
        let shaheds: Vec<_> = groups.iter().filter(|g| g.category == Category::Shahed).collect();
        assert_eq!(shaheds.len(), 2);
        assert_eq!(shaheds[0].quantity, 4);
        assert_eq!(shaheds[0].origin, "Cherkasy");
        assert_eq!(shaheds[1].destination, "Poltava");
    }

    #[test]
    fn test_summary_skips_incomplete_entry() {
        let mut groups = Vec::new();
        apply(
            &mut groups,
            &[
                launch(5, Category::Shahed, "a", "Kyiv"),
                launch(2, Category::Rocket, "Black Sea", "Odesa"),
            ],
        );

        let summary = [
            cont(4, Category::Shahed, "Cherkasy", "Smila"),
            Event::Continue(GroupReport {
                quantity: Some(6),
                category: Some(Category::Shahed),
                origin: None,
                destination: Some("Lviv".into()),
                heading: None,
            }),
            cont(3, Category::Shahed, "Sumy", "Poltava"),
        ];
        assert_eq!(classify_batch(&summary), BatchKind::Summary(Category::Shahed));
        let created = replace_category(&mut groups, Category::Shahed, &summary, Utc::now());

        assert_eq!(created, 2);
        let destinations: Vec<_> = groups.iter().map(|g| g.destination.as_str()).collect();
        assert_eq!(destinations, vec!["Odesa", "Smila", "Poltava"]);
    }
}

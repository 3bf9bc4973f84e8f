//! Classified events consumed by the state manager, and the notices it emits.
//!
//! On the wire an event is `{"event": "<kind>", "details": {...}}`. Detail
//! keys accept the canonical names as well as the classifier's legacy
//! spelling (`item`, `from`, `to`, `direction`, `city`). Unknown kinds are
//! kept as [`Event::Unrecognized`] so reconciliation can report them
//! instead of failing the whole batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::enums::{Category, EventKind};

/// A single change to the tracked airspace picture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEvent", into = "RawEvent")]
pub enum Event {
    /// A new group took off.
    Launch(GroupReport),
    /// An existing group is still in flight (possibly with new numbers).
    Continue(GroupReport),
    /// Some or all of a group reached the ground or was shot down.
    Landed(LandedReport),
    /// A diffuse, non-directional threat over a region.
    Alarm(AlarmReport),
    /// A kind the tracker does not understand.
    Unrecognized { kind: String },
}

/// Details shared by `launch` and `continue`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    #[serde(default, deserialize_with = "lenient_quantity", skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default, alias = "item", deserialize_with = "lenient_category", skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, alias = "from", skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, alias = "to", skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, alias = "direction", skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
}

/// Details of a `landed` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LandedReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Details of an `alarm` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlarmReport {
    #[serde(default, deserialize_with = "lenient_quantity", skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default, alias = "item", deserialize_with = "lenient_category", skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Sent on the notification channel when idle expiry clears the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiryNotice {
    /// One synthetic `landed` event per group that was cleared.
    pub events: Vec<Event>,
    pub cleared_at: DateTime<Utc>,
}

impl Event {
    /// Build a `landed` event, as synthesized on idle expiry.
    pub fn landed(quantity: u32, category: Category, location: impl Into<String>) -> Self {
        Event::Landed(LandedReport {
            quantity: Some(quantity),
            category: Some(category),
            location: Some(location.into()),
        })
    }

    /// Wire name of this event's kind.
    pub fn kind_name(&self) -> &str {
        match self {
            Event::Launch(_) => EventKind::Launch.as_str(),
            Event::Continue(_) => EventKind::Continue.as_str(),
            Event::Landed(_) => EventKind::Landed.as_str(),
            Event::Alarm(_) => EventKind::Alarm.as_str(),
            Event::Unrecognized { kind } => kind,
        }
    }

    pub fn category(&self) -> Option<Category> {
        match self {
            Event::Launch(r) | Event::Continue(r) => r.category,
            Event::Landed(r) => r.category,
            Event::Alarm(r) => r.category,
            Event::Unrecognized { .. } => None,
        }
    }
}

/// Untyped wire envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub event: String,
    #[serde(default)]
    pub details: Value,
}

/// `landed` details as the classifier sends them: the location may arrive
/// under any of several keys.
#[derive(Deserialize)]
struct LandedWire {
    #[serde(default, deserialize_with = "lenient_quantity")]
    quantity: Option<u32>,
    #[serde(default, alias = "item", deserialize_with = "lenient_category")]
    category: Option<Category>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default, alias = "destination")]
    to: Option<String>,
    #[serde(default, alias = "origin")]
    from: Option<String>,
}

impl TryFrom<RawEvent> for Event {
    type Error = serde_json::Error;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let details = match raw.details {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let Some(kind) = EventKind::parse(&raw.event) else {
            return Ok(Event::Unrecognized { kind: raw.event });
        };
        Ok(match kind {
            EventKind::Launch => Event::Launch(serde_json::from_value(details)?),
            EventKind::Continue => Event::Continue(serde_json::from_value(details)?),
            EventKind::Landed => {
                let wire: LandedWire = serde_json::from_value(details)?;
                Event::Landed(LandedReport {
                    quantity: wire.quantity,
                    category: wire.category,
                    location: wire.location.or(wire.city).or(wire.to).or(wire.from),
                })
            }
            EventKind::Alarm => Event::Alarm(serde_json::from_value(details)?),
        })
    }
}

impl From<Event> for RawEvent {
    fn from(event: Event) -> Self {
        let event_name = event.kind_name().to_string();
        let details = match &event {
            Event::Launch(r) | Event::Continue(r) => serde_json::to_value(r),
            Event::Landed(r) => serde_json::to_value(r),
            Event::Alarm(r) => serde_json::to_value(r),
            Event::Unrecognized { .. } => Ok(Value::Null),
        };
        RawEvent {
            event: event_name,
            details: details.unwrap_or_default(),
        }
    }
}

/// Missing, null, zero or non-numeric quantities all mean "unspecified".
fn lenient_quantity<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n > 0))
}

/// Unknown categories are treated as missing so the event is skipped by
/// reconciliation rather than failing to decode.
fn lenient_category<'de, D>(deserializer: D) -> Result<Option<Category>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|s| Category::parse(&s)))
}

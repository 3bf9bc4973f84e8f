//! Report classification: raw report text in, ordered events out.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use raidwatch_core::events::Event;
use raidwatch_core::state::WorldState;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classifier output is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("classifier output has no \"events\" array")]
    MissingEvents,
}

/// One raw report from the upstream feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub text: String,
    /// Text of the report this one replies to, if any.
    #[serde(default)]
    pub reply_to: Option<String>,
}

/// Classified events plus the raw output they came from.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub events: Vec<Event>,
    pub raw: String,
}

pub trait Classifier: Send {
    /// Turn `report` into events given the currently tracked state.
    fn classify(&self, report: &Report, state: &WorldState) -> Result<Classification, ClassifyError>;
}

/// Reads reports whose text already is the classifier's JSON answer:
/// `{"events": [{"event": "...", "details": {...}}, ...]}`.
///
/// A Markdown code fence around the document is tolerated. Entries that do
/// not decode are dropped one by one; the rest of the batch survives.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEventsClassifier;

#[derive(Deserialize)]
struct EventsDocument {
    events: Option<Vec<Value>>,
}

impl Classifier for JsonEventsClassifier {
    fn classify(&self, report: &Report, state: &WorldState) -> Result<Classification, ClassifyError> {
        debug!(
            report = %report.id,
            tracked = state.len(),
            reply = report.reply_to.is_some(),
            "Classifying report"
        );
        let raw = report.text.trim().to_string();
        let doc: EventsDocument = serde_json::from_str(strip_fence(&raw))?;
        let entries = doc.events.ok_or(ClassifyError::MissingEvents)?;

        let mut events = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match serde_json::from_value::<Event>(entry) {
                Ok(event) => events.push(event),
                Err(e) => warn!(report = %report.id, index, error = %e, "Dropping malformed event"),
            }
        }
        Ok(Classification { events, raw })
    }
}

fn strip_fence(text: &str) -> &str {
    let Some(body) = text.strip_prefix("```") else {
        return text;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

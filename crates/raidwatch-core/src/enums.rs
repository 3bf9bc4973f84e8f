//! Enumeration types used throughout the tracker.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Threat category reported by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Loitering munition / attack drone.
    Shahed,
    /// Cruise or ballistic missile, guided bomb.
    Rocket,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Shahed => "shahed",
            Category::Rocket => "rocket",
        }
    }

    /// Case-insensitive parse of a category name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "shahed" => Some(Category::Shahed),
            "rocket" => Some(Category::Rocket),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire name of an event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Launch,
    Continue,
    Landed,
    Alarm,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Launch => "launch",
            EventKind::Continue => "continue",
            EventKind::Landed => "landed",
            EventKind::Alarm => "alarm",
        }
    }

    /// Parse a wire name. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "launch" => Some(EventKind::Launch),
            "continue" => Some(EventKind::Continue),
            "landed" => Some(EventKind::Landed),
            "alarm" => Some(EventKind::Alarm),
            _ => None,
        }
    }
}

/// How a batch of events is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchKind {
    /// The batch restates the complete picture for one category.
    Summary(Category),
    /// The batch describes deltas, applied one event at a time.
    Incremental,
}

/// Expiry timer state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerState {
    #[default]
    Disarmed,
    Armed,
}

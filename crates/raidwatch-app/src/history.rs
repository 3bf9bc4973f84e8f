//! Append-only processing history: one JSON line per report and one per
//! rendering pass. Write failures are logged and never stop processing.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use raidwatch_core::events::Event;
use raidwatch_core::state::{MapView, PlottableObject};

/// What happened to one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub report_id: String,
    pub text: String,
    pub reply_to: Option<String>,
    pub events: Vec<Event>,
    /// Raw classifier output, or an error marker.
    pub classifier_output: String,
    pub timestamp: DateTime<Utc>,
}

/// One rendering pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRecord {
    pub pass_id: String,
    /// `None` when the pass produced no map.
    pub artifact: Option<PathBuf>,
    pub objects: Vec<PlottableObject>,
    /// `None` when nothing could be framed.
    pub view: Option<MapView>,
    /// Why the pass produced no map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
pub struct History {
    reports: PathBuf,
    maps: PathBuf,
    write_lock: Mutex<()>,
}

impl History {
    /// Logs live in `dir` as `reports.jsonl` and `maps.jsonl`.
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            reports: dir.join("reports.jsonl"),
            maps: dir.join("maps.jsonl"),
            write_lock: Mutex::new(()),
        })
    }

    pub fn record_report(&self, record: &ReportRecord) {
        self.append(&self.reports, record);
    }

    pub fn record_map(&self, record: &MapRecord) {
        self.append(&self.maps, record);
    }

    pub fn reports_path(&self) -> &Path {
        &self.reports
    }

    pub fn maps_path(&self) -> &Path {
        &self.maps
    }

    fn append<T: Serialize>(&self, path: &Path, record: &T) {
        let result = serde_json::to_string(record)
            .map_err(std::io::Error::from)
            .and_then(|mut line| {
                line.push('\n');
                let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?
                    .write_all(line.as_bytes())
            });
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to append history record");
        }
    }
}

/// Read every well-formed line of a history file.
pub fn read_records<T: for<'de> Deserialize<'de>>(path: &Path) -> std::io::Result<Vec<T>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}

//! Audit trail of geocoding attempts.
//!
//! Every provider lookup is recorded against the pass that triggered it,
//! whether it succeeded or not. Sinks never fail the pass: write errors are
//! logged and dropped.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use raidwatch_core::types::GeoPoint;

/// One provider lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeAttempt {
    /// Id of the report (or system action) that started the pass.
    pub pass_id: String,
    pub location_name: String,
    pub coords: Option<GeoPoint>,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Destination for geocoding audit entries.
pub trait GeocodeAudit: Send + Sync {
    fn record(&self, attempt: &GeocodeAttempt);
}

/// Audit sink that only emits tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl GeocodeAudit for TracingAudit {
    fn record(&self, attempt: &GeocodeAttempt) {
        debug!(
            pass = %attempt.pass_id,
            location = %attempt.location_name,
            success = attempt.success,
            "Geocode attempt"
        );
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonlAudit {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAudit {
    /// Create the sink, making sure the parent directory exists.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, attempt: &GeocodeAttempt) -> std::io::Result<()> {
        let mut line = serde_json::to_string(attempt)?;
        line.push('\n');
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

impl GeocodeAudit for JsonlAudit {
    fn record(&self, attempt: &GeocodeAttempt) {
        if let Err(e) = self.append(attempt) {
            warn!(path = %self.path.display(), error = %e, "Failed to write geocode audit entry");
        }
    }
}

/// Read back every entry of a JSON-lines audit file, skipping malformed lines.
pub fn read_audit_log(path: &Path) -> std::io::Result<Vec<GeocodeAttempt>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}

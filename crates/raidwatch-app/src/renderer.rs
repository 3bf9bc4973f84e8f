//! Map rendering boundary.
//!
//! The pipeline hands a fully resolved payload to a [`MapRenderer`] and gets
//! back the path of the produced artifact. The shipped renderer writes the
//! payload as JSON for a browser-side map page to pick up.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use raidwatch_core::state::{MapView, PlottableObject};

use crate::config::{MapStyling, ModelCatalog};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write map artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode map payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Everything a map page needs to draw one frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPayload<'a> {
    pub pass_id: &'a str,
    pub objects: &'a [PlottableObject],
    pub view: &'a MapView,
    pub styling: &'a MapStyling,
    pub model_paths: &'a ModelCatalog,
    pub generated_at: DateTime<Utc>,
}

pub trait MapRenderer: Send {
    /// Produce the artifact for `payload` and return where it was written.
    fn render(&self, payload: &MapPayload<'_>) -> Result<PathBuf, RenderError>;
}

/// Writes `map_<pass>.json` into a directory.
#[derive(Debug, Clone)]
pub struct JsonPayloadRenderer {
    dir: PathBuf,
}

impl JsonPayloadRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn artifact_path(&self, pass_id: &str) -> PathBuf {
        let safe: String = pass_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("map_{safe}.json"))
    }
}

impl MapRenderer for JsonPayloadRenderer {
    fn render(&self, payload: &MapPayload<'_>) -> Result<PathBuf, RenderError> {
        let path = self.artifact_path(payload.pass_id);
        let io_err = |source| RenderError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let json = serde_json::to_string_pretty(payload)?;
        fs::write(&path, json).map_err(io_err)?;
        info!(
            pass = payload.pass_id,
            objects = payload.objects.len(),
            path = %path.display(),
            "Map payload written"
        );
        Ok(path)
    }
}

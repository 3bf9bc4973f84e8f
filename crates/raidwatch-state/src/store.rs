//! Persistence of the tracked group collection.
//!
//! The whole collection is loaded once at startup and written back in full
//! after every batch. There is no partial update.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use raidwatch_core::state::ActiveObjectGroup;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {path} is not valid: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state store lock poisoned")]
    Poisoned,
}

/// Durable home of the group collection.
pub trait StateStore: Send {
    fn load_all(&self) -> Result<Vec<ActiveObjectGroup>, StoreError>;
    fn replace_all(&self, groups: &[ActiveObjectGroup]) -> Result<(), StoreError>;
}

/// On-disk document; versioned so the layout can change later.
#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    groups: Vec<ActiveObjectGroup>,
}

const STATE_FILE_VERSION: u32 = 1;

/// Keeps the collection in a single JSON file.
///
/// Writes go to a sibling temp file that is then renamed over the target,
/// so a crash mid-write leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStore {
    fn load_all(&self) -> Result<Vec<ActiveObjectGroup>, StoreError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No state file yet; starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_err(e)),
        };
        let file: StateFile = serde_json::from_str(&json).map_err(|source| StoreError::Serde {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), groups = file.groups.len(), "Loaded state");
        Ok(file.groups)
    }

    fn replace_all(&self, groups: &[ActiveObjectGroup]) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_err(e))?;
        }
        let file = StateFile {
            version: STATE_FILE_VERSION,
            groups: groups.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|source| StoreError::Serde {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.temp_path();
        fs::write(&tmp, json).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        debug!(path = %self.path.display(), groups = groups.len(), "Persisted state");
        Ok(())
    }
}

/// In-process store. Clones share the same collection.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    groups: Vec<ActiveObjectGroup>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_groups(groups: Vec<ActiveObjectGroup>) -> Self {
        let store = Self::default();
        if let Ok(mut inner) = store.inner.lock() {
            inner.groups = groups;
        }
        store
    }

    /// Current stored collection.
    pub fn groups(&self) -> Vec<ActiveObjectGroup> {
        self.inner
            .lock()
            .map(|inner| inner.groups.clone())
            .unwrap_or_default()
    }

    /// Number of `replace_all` calls so far.
    pub fn writes(&self) -> usize {
        self.inner.lock().map(|inner| inner.writes).unwrap_or(0)
    }
}

impl StateStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<ActiveObjectGroup>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.groups.clone())
    }

    fn replace_all(&self, groups: &[ActiveObjectGroup]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        inner.groups = groups.to_vec();
        inner.writes += 1;
        Ok(())
    }
}

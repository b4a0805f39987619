//! Small persisted document: an installation id and the first-run flag.
//!
//! Stored as JSON (`{"id": "...", "first-time-run": false}`) in the app data
//! directory. A missing or unreadable file is replaced by a fresh document
//! with a new v4 id.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const STORE_FILE_NAME: &str = "store.json";

/// Errors from persisting the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to write store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode store: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// On-disk shape of the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub id: String,
    /// Set once the first-use notification has been shown.
    #[serde(rename = "first-time-run", default)]
    pub first_time_run: bool,
}

/// Thread-safe handle to the store document.
pub struct Store {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl Store {
    /// Loads the store at `path`, creating a new one when absent or corrupt.
    ///
    /// Failing to write a fresh document is logged; the in-memory copy is
    /// still usable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match load(&path) {
            Some(data) => data,
            None => {
                debug!("initializing new store");
                let data = StoreData {
                    id: uuid::Uuid::new_v4().to_string(),
                    first_time_run: false,
                };
                if let Err(e) = write(&path, &data) {
                    warn!(error = %e, "failed to persist new store");
                }
                data
            }
        };

        Self {
            path,
            data: Mutex::new(data),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn id(&self) -> String {
        self.data
            .lock()
            .map(|d| d.id.clone())
            .unwrap_or_default()
    }

    pub fn first_time_run(&self) -> bool {
        self.data.lock().map(|d| d.first_time_run).unwrap_or(false)
    }

    /// Updates the flag, writing only when it changes.
    pub fn set_first_time_run(&self, value: bool) -> Result<(), StoreError> {
        let mut data = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        if data.first_time_run == value {
            return Ok(());
        }
        data.first_time_run = value;
        write(&self.path, &data)
    }
}

fn load(path: &Path) -> Option<StoreData> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unexpected error opening store, creating a new one");
            return None;
        }
    };

    match serde_json::from_str::<StoreData>(&content) {
        Ok(data) if !data.id.is_empty() => {
            debug!(path = %path.display(), id = %data.id, "loaded existing store");
            Some(data)
        }
        Ok(_) => {
            warn!(path = %path.display(), "store has no id, creating a new one");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to decode store file, creating a new one");
            None
        }
    }
}

fn write(path: &Path, data: &StoreData) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let payload = serde_json::to_vec(data)?;
    std::fs::write(path, &payload).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), "wrote store");
    Ok(())
}

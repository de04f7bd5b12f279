//! JSON file-backed persistence for Vigil agent state.
//!
//! Each logical store owns one snapshot file under the agent's data
//! directory. Stores load their full state at startup and rewrite the
//! snapshot after every mutation; writes go through a temp file and an
//! atomic rename so a crash mid-write never corrupts the previous snapshot.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

/// Errors that can occur while reading or writing a snapshot.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Filesystem read/write failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PersistError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistError>;

/// A single JSON snapshot file for one logical store.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// Creates a store handle for `<dir>/<name>.json`.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{name}.json")),
        }
    }

    /// Returns the snapshot path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot, falling back to `T::default()` when the file is
    /// missing, unreadable, or corrupt. Unreadable snapshots are logged and
    /// discarded.
    #[must_use]
    pub fn load<T: DeserializeOwned + Default>(&self) -> T {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return T::default(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read snapshot");
                return T::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "snapshot is corrupt, starting empty");
                T::default()
            }
        }
    }

    /// Writes the snapshot atomically (temp file + rename).
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// snapshot cannot be written.
    pub fn save<T: Serialize>(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(value)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;

        Ok(())
    }
}

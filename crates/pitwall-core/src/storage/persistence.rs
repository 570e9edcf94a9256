//! Snapshot persistence
//!
//! Handles saving and loading the JSON-serialized snapshot to/from the
//! filesystem. Uses atomic writes (write to temp file, then rename) to
//! prevent corruption.
//!
//! Storage location: `~/.local/share/pitwall/` (configurable via `Config`)
//!
//! Files:
//! - `store.json` - The serialized snapshot
//! - `remote_id` - The cloud relay blob id, once one has been created

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tracing::warn;

use super::error::{StorageError, StorageResult};
use crate::config::Config;
use crate::store::AppStore;

/// Persistence layer for the application snapshot
///
/// Provides atomic file operations for saving/loading the snapshot.
pub struct SnapshotPersistence {
    config: Config,
}

impl SnapshotPersistence {
    /// Create a new persistence handler with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check if a snapshot exists on disk
    pub fn exists(&self) -> bool {
        self.config.snapshot_path().exists()
    }

    /// Save a snapshot to disk using atomic write
    ///
    /// This writes to a temporary file first, then renames it to the
    /// target path, so the file is never left in a partially-written state.
    pub fn save(&self, snapshot: &AppStore) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let target_path = self.config.snapshot_path();

        atomic_write(&target_path, &bytes)
    }

    /// Load a snapshot from disk
    ///
    /// Returns `None` if the snapshot file doesn't exist.
    /// Returns an error if the file exists but can't be read or parsed.
    pub fn load(&self) -> StorageResult<Option<AppStore>> {
        let path = self.config.snapshot_path();

        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path).map_err(|e| StorageError::ReadError {
            path: path.clone(),
            source: e,
        })?;

        let snapshot =
            serde_json::from_slice(&bytes).map_err(|e| StorageError::CorruptSnapshot {
                path: path.clone(),
                details: e.to_string(),
            })?;

        Ok(Some(snapshot))
    }

    /// Load the stored snapshot, falling back to the seed snapshot
    ///
    /// A missing file yields the seed silently; a corrupt file is logged
    /// and also yields the seed rather than failing startup.
    pub fn load_or_seed(&self) -> AppStore {
        match self.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => AppStore::seed(),
            Err(e) => {
                warn!("Discarding stored snapshot: {}", e);
                AppStore::seed()
            }
        }
    }

    /// Save the cloud relay blob id
    pub fn save_remote_id(&self, id: &str) -> StorageResult<()> {
        atomic_write(&self.config.remote_id_path(), id.as_bytes())
    }

    /// Load the cloud relay blob id from disk
    ///
    /// Returns `None` if no id has been stored yet.
    pub fn load_remote_id(&self) -> StorageResult<Option<String>> {
        let path = self.config.remote_id_path();

        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| StorageError::ReadError {
            path: path.clone(),
            source: e,
        })?;

        Ok(Some(content.trim().to_string()))
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    // Create temp file in the same directory (for atomic rename)
    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    // Sync to disk before rename
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    // Atomic rename
    fs::rename(&temp_path, path).map_err(|e| StorageError::from_io(e, path.to_path_buf()))?;

    Ok(())
}

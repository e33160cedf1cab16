//! Manifest repository for JSON storage
//!
//! Records one entry per stored snapshot in manifest.json. The manifest is
//! always re-read from disk, so every mutation is a read-modify-write that
//! publishes through an atomic rename. Callers serialize mutations with the
//! backup directory lock.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SnapvaultError, SnapvaultResult};
use crate::models::SnapshotRecord;

use super::file_io::{read_json, write_json_atomic};

/// Current manifest format version
pub const MANIFEST_VERSION: u32 = 1;

/// Serializable manifest structure
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestData {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    snapshots: Vec<SnapshotRecord>,
}

fn default_version() -> u32 {
    MANIFEST_VERSION
}

impl Default for ManifestData {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            snapshots: Vec::new(),
        }
    }
}

/// Repository for the snapshot manifest
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    /// Create a new manifest repository
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the manifest path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> SnapvaultResult<ManifestData> {
        let data: ManifestData = read_json(&self.path)?;
        if data.version != MANIFEST_VERSION {
            return Err(SnapvaultError::Storage(format!(
                "Unsupported manifest version: {}",
                data.version
            )));
        }
        Ok(data)
    }

    fn save(&self, snapshots: Vec<SnapshotRecord>) -> SnapvaultResult<()> {
        let data = ManifestData {
            version: MANIFEST_VERSION,
            snapshots,
        };
        write_json_atomic(&self.path, &data)
    }

    /// All records, oldest first
    pub fn list(&self) -> SnapvaultResult<Vec<SnapshotRecord>> {
        Ok(self.load()?.snapshots)
    }

    /// Get a record by name
    pub fn get(&self, name: &str) -> SnapvaultResult<Option<SnapshotRecord>> {
        Ok(self.list()?.into_iter().find(|r| r.name == name))
    }

    /// Check whether a name is recorded
    pub fn contains(&self, name: &str) -> SnapvaultResult<bool> {
        Ok(self.get(name)?.is_some())
    }

    /// Append a record
    pub fn append(&self, record: SnapshotRecord) -> SnapvaultResult<()> {
        let mut snapshots = self.list()?;
        if snapshots.iter().any(|r| r.name == record.name) {
            return Err(SnapvaultError::duplicate_snapshot(record.name));
        }
        snapshots.push(record);
        self.save(snapshots)
    }

    /// Remove a record by name, returning it if it was present
    pub fn remove(&self, name: &str) -> SnapvaultResult<Option<SnapshotRecord>> {
        let mut snapshots = self.list()?;
        let Some(index) = snapshots.iter().position(|r| r.name == name) else {
            return Ok(None);
        };
        let removed = snapshots.remove(index);
        self.save(snapshots)?;
        Ok(Some(removed))
    }

    /// Replace the whole manifest, ordering records chronologically
    pub fn replace_all(&self, mut snapshots: Vec<SnapshotRecord>) -> SnapvaultResult<()> {
        snapshots.sort_by(SnapshotRecord::chronological_cmp);
        self.save(snapshots)
    }
}

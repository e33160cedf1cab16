//! Snapshot restoration for snapvault
//!
//! Reads a stored snapshot, decrypts it when the record says it is
//! encrypted, and unpacks it into a destination directory. Nothing in the
//! backup directory is modified, and a missing key is never generated.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::archive::{Archiver, UnpackStats};
use crate::config::paths::BackupPaths;
use crate::crypto::{self, KeyStore};
use crate::error::{SnapvaultError, SnapvaultResult};
use crate::integrity;
use crate::models::SnapshotRecord;

/// Handles restoring and verifying stored snapshots
pub struct RestoreManager<'a> {
    paths: &'a BackupPaths,
    key_store: &'a KeyStore,
    archiver: &'a Archiver,
}

impl<'a> RestoreManager<'a> {
    /// Create a new RestoreManager
    pub fn new(paths: &'a BackupPaths, key_store: &'a KeyStore, archiver: &'a Archiver) -> Self {
        Self {
            paths,
            key_store,
            archiver,
        }
    }

    /// Restore a snapshot into `dest`
    ///
    /// Tampered or wrongly keyed snapshots fail with `Authentication` before
    /// anything is written to `dest`.
    pub fn restore(&self, record: &SnapshotRecord, dest: &Path) -> SnapvaultResult<UnpackStats> {
        let path = self.paths.snapshot_file(&record.file_name);
        let stored = fs::read(&path).map_err(|e| {
            SnapvaultError::Io(format!("Failed to read snapshot {}: {}", path.display(), e))
        })?;

        let archive = if record.encrypted {
            let key = self.key_store.load()?;
            crypto::decrypt(&stored, &key)?
        } else {
            stored
        };

        let stats = self.archiver.unpack(archive.as_slice(), dest)?;
        info!(
            name = %record.name,
            dest = %dest.display(),
            files = stats.file_count,
            "Snapshot restored"
        );
        Ok(stats)
    }

    /// Check a stored snapshot against its recorded digest
    ///
    /// Works on the stored bytes, so no key is needed.
    pub fn verify(&self, record: &SnapshotRecord) -> SnapvaultResult<bool> {
        let path = self.paths.snapshot_file(&record.file_name);
        integrity::verify(&path, &record.content_hash)
    }
}

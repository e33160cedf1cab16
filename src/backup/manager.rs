//! Backup manager for snapvault
//!
//! Owns one source/backup directory pair and runs the snapshot pipeline:
//! archive, encrypt, write, hash, record, rotate. Every mutating operation
//! holds the directory's exclusive lock for its whole duration.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::archive::{Archiver, SkippedEntry};
use crate::config::paths::BackupPaths;
use crate::config::settings::SnapshotConfig;
use crate::crypto::{self, KeyStore};
use crate::error::{SnapvaultError, SnapvaultResult};
use crate::integrity;
use crate::lock::DirLock;
use crate::models::SnapshotRecord;
use crate::storage::file_io::write_bytes_atomic;
use crate::storage::ManifestStore;

use super::naming;
use super::reconcile::{self, ReconcileReport};
use super::restore::RestoreManager;

/// Pipeline stage, used for progress and failure logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Archiving,
    Encrypting,
    Writing,
    Hashing,
    Recording,
    Rotating,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Archiving => "archiving",
            Self::Encrypting => "encrypting",
            Self::Writing => "writing",
            Self::Hashing => "hashing",
            Self::Recording => "recording",
            Self::Rotating => "rotating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// Outcome of a successful snapshot
#[derive(Debug, Clone)]
pub struct SnapshotReport {
    /// Record of the new snapshot
    pub record: SnapshotRecord,
    /// Entries left out of the archive
    pub skipped: Vec<SkippedEntry>,
    /// Snapshots deleted by rotation, oldest first
    pub rotated: Vec<SnapshotRecord>,
}

/// Manages snapshot creation, retention, and restore for one backup directory
#[derive(Debug)]
pub struct BackupManager {
    config: SnapshotConfig,
    paths: BackupPaths,
    key_store: KeyStore,
    manifest: ManifestStore,
    archiver: Archiver,
}

impl BackupManager {
    /// Create a manager, creating the backup directory if needed
    ///
    /// The backup directory may sit inside the source tree, where it is left
    /// out of every archive, but it may not be the source directory itself.
    pub fn new(config: SnapshotConfig) -> SnapvaultResult<Self> {
        if let (Ok(source), Ok(backup)) = (
            fs::canonicalize(&config.source_dir),
            fs::canonicalize(&config.backup_dir),
        ) {
            if source == backup {
                return Err(SnapvaultError::InvalidPolicy(format!(
                    "backup directory must differ from the source directory: {}",
                    backup.display()
                )));
            }
        }

        let paths = BackupPaths::new(&config.backup_dir);
        paths.ensure_directories()?;

        Ok(Self {
            key_store: KeyStore::new(paths.key_file()),
            manifest: ManifestStore::new(paths.manifest_file()),
            archiver: Archiver::new(config.compression_level),
            paths,
            config,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Get the backup directory layout
    pub fn paths(&self) -> &BackupPaths {
        &self.paths
    }

    /// Full path of a recorded snapshot's file
    pub fn snapshot_path(&self, record: &SnapshotRecord) -> PathBuf {
        self.paths.snapshot_file(&record.file_name)
    }

    /// Take a snapshot under a generated, timestamped name
    pub fn create_snapshot(&self) -> SnapvaultResult<SnapshotReport> {
        let _lock = DirLock::exclusive(&self.paths.lock_file())?;
        self.run_pipeline(None)
    }

    /// Take a snapshot under a caller-chosen name
    pub fn create_named_snapshot(&self, name: &str) -> SnapvaultResult<SnapshotReport> {
        naming::validate_name(name)?;
        let _lock = DirLock::exclusive(&self.paths.lock_file())?;

        let records = self.manifest.list()?;
        if self.name_taken(&records, name) {
            return Err(SnapvaultError::duplicate_snapshot(name));
        }
        self.run_pipeline(Some(name))
    }

    /// Delete snapshots beyond the retention count, oldest first
    pub fn cleanup_old_snapshots(&self) -> SnapvaultResult<Vec<SnapshotRecord>> {
        let _lock = DirLock::exclusive(&self.paths.lock_file())?;
        self.rotate()
    }

    /// Delete one snapshot's file and record
    pub fn delete_snapshot(&self, name: &str) -> SnapvaultResult<SnapshotRecord> {
        let _lock = DirLock::exclusive(&self.paths.lock_file())?;

        let record = self
            .manifest
            .get(name)?
            .ok_or_else(|| SnapvaultError::snapshot_not_found(name))?;
        self.remove_snapshot(&record)?;
        info!(name = %record.name, "Deleted snapshot");
        Ok(record)
    }

    /// All recorded snapshots, oldest first
    pub fn list_snapshots(&self) -> SnapvaultResult<Vec<SnapshotRecord>> {
        let _lock = DirLock::shared(&self.paths.lock_file())?;
        let mut records = self.manifest.list()?;
        records.sort_by(SnapshotRecord::chronological_cmp);
        Ok(records)
    }

    /// The newest recorded snapshot, if any
    pub fn latest_snapshot(&self) -> SnapvaultResult<Option<SnapshotRecord>> {
        Ok(self.list_snapshots()?.pop())
    }

    /// Restore a snapshot into `dest`, which must be absent or empty
    pub fn restore_snapshot(&self, name: &str, dest: &Path) -> SnapvaultResult<PathBuf> {
        let _lock = DirLock::shared(&self.paths.lock_file())?;
        let record = self.require(name)?;
        self.restorer().restore(&record, dest)?;
        Ok(dest.to_path_buf())
    }

    /// Re-hash a stored snapshot and compare it with its recorded digest
    pub fn verify_integrity(&self, name: &str) -> SnapvaultResult<bool> {
        let _lock = DirLock::shared(&self.paths.lock_file())?;
        let record = self.require(name)?;
        self.restorer().verify(&record)
    }

    /// Bring the manifest and the directory contents back into agreement
    pub fn reconcile(&self) -> SnapvaultResult<ReconcileReport> {
        let _lock = DirLock::exclusive(&self.paths.lock_file())?;
        reconcile::reconcile(&self.paths, &self.manifest)
    }

    fn restorer(&self) -> RestoreManager<'_> {
        RestoreManager::new(&self.paths, &self.key_store, &self.archiver)
    }

    fn require(&self, name: &str) -> SnapvaultResult<SnapshotRecord> {
        self.manifest
            .get(name)?
            .ok_or_else(|| SnapvaultError::snapshot_not_found(name))
    }

    fn run_pipeline(&self, requested: Option<&str>) -> SnapvaultResult<SnapshotReport> {
        let mut stage = Stage::Archiving;
        let result = self.pipeline(requested, &mut stage);
        if let Err(e) = &result {
            error!(stage = %Stage::Failed, failed_at = %stage, error = %e, "Snapshot failed");
        }
        result
    }

    fn pipeline(&self, requested: Option<&str>, stage: &mut Stage) -> SnapvaultResult<SnapshotReport> {
        let created_at = Utc::now();

        enter(stage, Stage::Archiving);
        let mut archive = Vec::new();
        let stats = self.archiver.pack_excluding(
            &self.config.source_dir,
            Some(self.paths.backup_dir()),
            &mut archive,
        )?;
        for entry in &stats.skipped {
            warn!(path = %entry.path.display(), reason = %entry.reason, "Skipped entry");
        }

        let encrypted = self.config.encryption_enabled;
        let payload = if encrypted {
            enter(stage, Stage::Encrypting);
            let key = self.key_store.load_or_create()?;
            crypto::encrypt(&archive, &key)?
        } else {
            archive
        };

        enter(stage, Stage::Writing);
        let name = match requested {
            Some(name) => name.to_string(),
            None => {
                let records = self.manifest.list()?;
                naming::unique_name(&naming::generate_name(created_at), |candidate| {
                    self.name_taken(&records, candidate)
                })
            }
        };
        let file_name = BackupPaths::snapshot_file_name(&name, encrypted);
        let path = self.paths.snapshot_file(&file_name);
        write_bytes_atomic(&path, &self.paths.snapshot_temp_file(&file_name), &payload)?;

        enter(stage, Stage::Hashing);
        let content_hash = integrity::hash(&payload);
        if self.config.verify_after_create {
            let verified = integrity::verify(&path, &content_hash);
            if !matches!(verified, Ok(true)) {
                let _ = fs::remove_file(&path);
                return Err(match verified {
                    Err(e) => e,
                    _ => SnapvaultError::Integrity(format!(
                        "{} does not match the digest it was written with",
                        file_name
                    )),
                });
            }
        }

        enter(stage, Stage::Recording);
        let record = SnapshotRecord {
            name,
            created_at,
            size_bytes: payload.len() as u64,
            content_hash,
            file_name,
            encrypted,
            file_count: Some(stats.file_count),
            adopted: false,
        };
        if let Err(e) = self.manifest.append(record.clone()) {
            let _ = fs::remove_file(&path);
            return Err(e);
        }

        // The snapshot is durable from here on; rotation failures leave it in place
        enter(stage, Stage::Rotating);
        let rotated = match self.rotate() {
            Ok(rotated) => rotated,
            Err(e) => {
                warn!(name = %record.name, error = %e, "Rotation failed, snapshot kept");
                Vec::new()
            }
        };

        enter(stage, Stage::Done);
        info!(
            name = %record.name,
            files = stats.file_count,
            size_bytes = record.size_bytes,
            skipped = stats.skipped.len(),
            rotated = rotated.len(),
            "Snapshot created"
        );

        Ok(SnapshotReport {
            record,
            skipped: stats.skipped,
            rotated,
        })
    }

    fn rotate(&self) -> SnapvaultResult<Vec<SnapshotRecord>> {
        let records = self.manifest.list()?;
        let victims = self.config.retention.select(&records);

        for record in &victims {
            self.remove_snapshot(record)?;
            info!(name = %record.name, "Rotated out snapshot");
        }
        Ok(victims)
    }

    /// Remove the file first, then the record
    fn remove_snapshot(&self, record: &SnapshotRecord) -> SnapvaultResult<()> {
        let path = self.snapshot_path(record);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Snapshot file already gone");
            }
            Err(e) => {
                return Err(SnapvaultError::Io(format!(
                    "Failed to delete {}: {}",
                    path.display(),
                    e
                )))
            }
        }
        self.manifest.remove(&record.name)?;
        Ok(())
    }

    fn name_taken(&self, records: &[SnapshotRecord], name: &str) -> bool {
        records.iter().any(|r| r.name == name)
            || [true, false].iter().any(|&encrypted| {
                self.paths
                    .snapshot_file(&BackupPaths::snapshot_file_name(name, encrypted))
                    .exists()
            })
    }
}

fn enter(current: &mut Stage, next: Stage) {
    debug!(stage = %next, "Entering stage");
    *current = next;
}

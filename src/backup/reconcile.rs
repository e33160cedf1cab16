//! Manifest reconciliation
//!
//! A crash can leave the backup directory and the manifest disagreeing: a
//! snapshot file renamed into place but never recorded, a record whose file
//! was removed by hand, or temp files from an interrupted write. This pass
//! repairs those cases:
//!
//! - orphaned snapshot files with a valid name are adopted into the manifest
//! - snapshot-looking files with an unusable name are flagged, never deleted
//! - records whose file is missing are dropped
//! - leftover `*.tmp` files are removed

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::paths::{parse_snapshot_file_name, BackupPaths, TEMP_SUFFIX};
use crate::error::{SnapvaultError, SnapvaultResult};
use crate::integrity;
use crate::models::SnapshotRecord;
use crate::storage::ManifestStore;

use super::naming;

/// What a reconciliation pass changed
#[derive(Debug, Default, Clone)]
pub struct ReconcileReport {
    /// Orphaned files added to the manifest
    pub adopted: Vec<SnapshotRecord>,
    /// Snapshot-looking files left alone for manual review
    pub flagged: Vec<PathBuf>,
    /// Records removed because their file is missing
    pub dropped: Vec<SnapshotRecord>,
    /// Temp files deleted
    pub removed_temp_files: Vec<PathBuf>,
}

impl ReconcileReport {
    /// True when the directory already agreed with the manifest
    pub fn is_clean(&self) -> bool {
        self.adopted.is_empty()
            && self.flagged.is_empty()
            && self.dropped.is_empty()
            && self.removed_temp_files.is_empty()
    }
}

/// Reconcile `manifest` with the files in the backup directory
///
/// The caller must hold the directory's exclusive lock.
pub fn reconcile(paths: &BackupPaths, manifest: &ManifestStore) -> SnapvaultResult<ReconcileReport> {
    let records = manifest.list()?;
    let mut report = ReconcileReport::default();

    let mut file_names: Vec<String> = Vec::new();
    for entry in fs::read_dir(paths.backup_dir()).map_err(|e| {
        SnapvaultError::Io(format!("Failed to read backup directory: {}", e))
    })? {
        let entry = entry
            .map_err(|e| SnapvaultError::Io(format!("Failed to read directory entry: {}", e)))?;
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            file_names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    file_names.sort();

    for file_name in &file_names {
        let path = paths.snapshot_file(file_name);

        if file_name.ends_with(TEMP_SUFFIX) {
            fs::remove_file(&path).map_err(|e| {
                SnapvaultError::Io(format!("Failed to remove {}: {}", path.display(), e))
            })?;
            info!(path = %path.display(), "Removed leftover temp file");
            report.removed_temp_files.push(path);
            continue;
        }

        let Some((stem, encrypted)) = parse_snapshot_file_name(file_name) else {
            continue;
        };
        if records.iter().any(|r| &r.file_name == file_name) {
            continue;
        }

        let name_in_use = records.iter().any(|r| r.name == stem)
            || report.adopted.iter().any(|r| r.name == stem);
        if !naming::is_valid_name(stem) || name_in_use {
            warn!(path = %path.display(), "Unrecognized snapshot file left for review");
            report.flagged.push(path);
            continue;
        }

        let record = adopt(&path, stem, file_name, encrypted)?;
        info!(name = %record.name, "Adopted orphaned snapshot");
        report.adopted.push(record);
    }

    let (kept, dropped): (Vec<_>, Vec<_>) = records
        .into_iter()
        .partition(|r| paths.snapshot_file(&r.file_name).exists());
    for record in &dropped {
        info!(name = %record.name, "Dropped record of missing snapshot file");
    }
    report.dropped = dropped;

    if !report.adopted.is_empty() || !report.dropped.is_empty() {
        let mut merged = kept;
        merged.extend(report.adopted.iter().cloned());
        manifest.replace_all(merged)?;
    }

    Ok(report)
}

fn adopt(
    path: &Path,
    name: &str,
    file_name: &str,
    encrypted: bool,
) -> SnapvaultResult<SnapshotRecord> {
    let metadata = fs::metadata(path)?;
    let created_at = naming::parse_timestamp(name)
        .or_else(|| metadata.modified().ok().map(DateTime::<Utc>::from))
        .unwrap_or_else(Utc::now);

    Ok(SnapshotRecord {
        name: name.to_string(),
        created_at,
        size_bytes: metadata.len(),
        content_hash: integrity::hash_file(path)?,
        file_name: file_name.to_string(),
        encrypted,
        file_count: None,
        adopted: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupManager;
    use crate::config::settings::SnapshotConfig;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn create_test_manager() -> (BackupManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.txt"), "0123456789").unwrap();

        let config = SnapshotConfig::new(&source, temp_dir.path().join("backups"));
        (BackupManager::new(config).unwrap(), temp_dir)
    }

    fn manifest_of(manager: &BackupManager) -> ManifestStore {
        ManifestStore::new(manager.paths().manifest_file())
    }

    #[test]
    fn test_clean_directory() {
        let (manager, _temp) = create_test_manager();
        manager.create_snapshot().unwrap();

        let report = manager.reconcile().unwrap();
        assert!(report.is_clean());
        assert_eq!(manager.list_snapshots().unwrap().len(), 1);
    }

    #[test]
    fn test_adopts_orphaned_file() {
        let (manager, _temp) = create_test_manager();
        let record = manager.create_snapshot().unwrap().record;

        // Crash between rename and manifest append
        manifest_of(&manager).remove(&record.name).unwrap();

        let report = manager.reconcile().unwrap();
        assert_eq!(report.adopted.len(), 1);

        let adopted = &report.adopted[0];
        assert_eq!(adopted.name, record.name);
        assert_eq!(adopted.content_hash, record.content_hash);
        assert_eq!(adopted.size_bytes, record.size_bytes);
        assert!(adopted.encrypted);
        assert!(adopted.adopted);
        assert!(manager.verify_integrity(&record.name).unwrap());
    }

    #[test]
    fn test_adopted_timestamp_comes_from_name() {
        let (manager, _temp) = create_test_manager();
        let path = manager.paths().snapshot_file("backup_20240102_030405.enc");
        fs::write(&path, b"opaque").unwrap();

        let report = manager.reconcile().unwrap();
        assert_eq!(
            report.adopted[0].created_at,
            Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
        );
    }

    #[test]
    fn test_drops_records_of_missing_files() {
        let (manager, _temp) = create_test_manager();
        let record = manager.create_snapshot().unwrap().record;
        fs::remove_file(manager.snapshot_path(&record)).unwrap();

        let report = manager.reconcile().unwrap();
        assert_eq!(report.dropped.len(), 1);
        assert!(manager.list_snapshots().unwrap().is_empty());
    }

    #[test]
    fn test_flags_unusable_names() {
        let (manager, _temp) = create_test_manager();
        let path = manager.paths().snapshot_file("not a name.enc");
        fs::write(&path, b"opaque").unwrap();

        let report = manager.reconcile().unwrap();
        assert_eq!(report.flagged, vec![path.clone()]);
        assert!(path.exists());
        assert!(manager.list_snapshots().unwrap().is_empty());
    }

    #[test]
    fn test_removes_temp_files() {
        let (manager, _temp) = create_test_manager();
        let leftover = manager.paths().snapshot_temp_file("backup_20240102_030405.enc");
        fs::write(&leftover, b"partial").unwrap();
        let manifest_temp = manager.paths().backup_dir().join("manifest.json.tmp");
        fs::write(&manifest_temp, b"{").unwrap();

        let report = manager.reconcile().unwrap();
        assert_eq!(report.removed_temp_files.len(), 2);
        assert!(!leftover.exists());
        assert!(!manifest_temp.exists());
        assert!(report.adopted.is_empty());
    }

    #[test]
    fn test_ignores_unrelated_files() {
        let (manager, _temp) = create_test_manager();
        fs::write(manager.paths().backup_dir().join("README"), "notes").unwrap();

        assert!(manager.reconcile().unwrap().is_clean());
    }

    #[test]
    fn test_busy_when_locked() {
        let (manager, _temp) = create_test_manager();
        let _held = crate::lock::DirLock::exclusive(&manager.paths().lock_file()).unwrap();
        assert!(manager.reconcile().unwrap_err().is_busy());
    }
}

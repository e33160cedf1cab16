//! Backup directory layout
//!
//! Every file snapvault keeps inside a backup directory is named here:
//!
//! ```text
//! <backup_dir>/
//!   .encryption_key      base64 key, owner-only permissions
//!   .lock                advisory lock file
//!   manifest.json        snapshot manifest
//!   <name>.enc           encrypted snapshot
//!   <name>.tar.gz        snapshot written with encryption disabled
//! ```

use std::path::{Path, PathBuf};

use crate::error::SnapvaultError;

/// Extension of encrypted snapshot files
pub const ENCRYPTED_EXTENSION: &str = "enc";

/// Extension of unencrypted snapshot files
pub const PLAIN_EXTENSION: &str = "tar.gz";

/// Suffix shared by all in-flight temporary files
pub const TEMP_SUFFIX: &str = ".tmp";

/// Manages all paths inside one backup directory
#[derive(Debug, Clone)]
pub struct BackupPaths {
    backup_dir: PathBuf,
}

impl BackupPaths {
    /// Create paths rooted at `backup_dir`
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
        }
    }

    /// Get the backup directory
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Get the path to the key file
    pub fn key_file(&self) -> PathBuf {
        self.backup_dir.join(".encryption_key")
    }

    /// Get the path to the advisory lock file
    pub fn lock_file(&self) -> PathBuf {
        self.backup_dir.join(".lock")
    }

    /// Get the path to the manifest
    pub fn manifest_file(&self) -> PathBuf {
        self.backup_dir.join("manifest.json")
    }

    /// File name a snapshot is stored under
    pub fn snapshot_file_name(name: &str, encrypted: bool) -> String {
        if encrypted {
            format!("{}.{}", name, ENCRYPTED_EXTENSION)
        } else {
            format!("{}.{}", name, PLAIN_EXTENSION)
        }
    }

    /// Full path of a stored snapshot file
    pub fn snapshot_file(&self, file_name: &str) -> PathBuf {
        self.backup_dir.join(file_name)
    }

    /// Temporary path a snapshot is written to before being renamed into place
    pub fn snapshot_temp_file(&self, file_name: &str) -> PathBuf {
        self.backup_dir.join(format!(".{}{}", file_name, TEMP_SUFFIX))
    }

    /// Ensure the backup directory exists
    pub fn ensure_directories(&self) -> Result<(), SnapvaultError> {
        std::fs::create_dir_all(&self.backup_dir)
            .map_err(|e| SnapvaultError::Io(format!("Failed to create backup directory: {}", e)))
    }
}

/// Split a stored snapshot file name into its snapshot name and encryption flag
///
/// Returns `None` for files that are not snapshots.
pub fn parse_snapshot_file_name(file_name: &str) -> Option<(&str, bool)> {
    if let Some(stem) = file_name.strip_suffix(&format!(".{}", ENCRYPTED_EXTENSION)) {
        return Some((stem, true));
    }
    if let Some(stem) = file_name.strip_suffix(&format!(".{}", PLAIN_EXTENSION)) {
        return Some((stem, false));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout() {
        let temp_dir = TempDir::new().unwrap();
        let paths = BackupPaths::new(temp_dir.path());

        assert_eq!(paths.backup_dir(), temp_dir.path());
        assert_eq!(paths.key_file(), temp_dir.path().join(".encryption_key"));
        assert_eq!(paths.manifest_file(), temp_dir.path().join("manifest.json"));
        assert_eq!(paths.lock_file(), temp_dir.path().join(".lock"));
    }

    #[test]
    fn test_snapshot_file_names() {
        assert_eq!(
            BackupPaths::snapshot_file_name("backup_20250101_120000", true),
            "backup_20250101_120000.enc"
        );
        assert_eq!(
            BackupPaths::snapshot_file_name("backup_20250101_120000", false),
            "backup_20250101_120000.tar.gz"
        );

        let paths = BackupPaths::new("/backups");
        assert_eq!(
            paths.snapshot_temp_file("a.enc"),
            PathBuf::from("/backups/.a.enc.tmp")
        );
    }

    #[test]
    fn test_parse_snapshot_file_name() {
        assert_eq!(parse_snapshot_file_name("x.enc"), Some(("x", true)));
        assert_eq!(parse_snapshot_file_name("x.tar.gz"), Some(("x", false)));
        assert_eq!(parse_snapshot_file_name("manifest.json"), None);
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = BackupPaths::new(temp_dir.path().join("nested").join("backups"));

        paths.ensure_directories().unwrap();
        assert!(paths.backup_dir().exists());
    }
}

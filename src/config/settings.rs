//! User settings for snapvault
//!
//! Settings are read from a JSON or YAML file, overridden by command-line
//! flags, and then validated into a [`SnapshotConfig`]. Out-of-range values
//! are rejected, never clamped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SnapvaultError, SnapvaultResult};
use crate::rotation::RetentionPolicy;

/// Lowest accepted compression level
pub const MIN_COMPRESSION_LEVEL: u32 = 1;

/// Highest accepted compression level
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// Settings as they appear in a configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Directory to snapshot
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Directory snapshots, manifest, key, and lock live in
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Hours between scheduled snapshots
    #[serde(default = "default_interval_hours")]
    pub interval_hours: f64,

    /// Number of snapshots kept by rotation
    #[serde(default = "default_retention_count")]
    pub retention_count: i64,

    /// Whether snapshots are encrypted
    #[serde(default = "default_true")]
    pub encryption_enabled: bool,

    /// Whether archives are compressed
    #[serde(default = "default_true")]
    pub compression_enabled: bool,

    /// Compression level (1 = fastest, 9 = smallest)
    #[serde(default = "default_compression_level")]
    pub compression_level: i64,

    /// Re-hash each snapshot from disk before recording it
    #[serde(default = "default_true")]
    pub verify_after_create: bool,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("./backups")
}

fn default_interval_hours() -> f64 {
    24.0
}

fn default_retention_count() -> i64 {
    5
}

fn default_compression_level() -> i64 {
    6
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            backup_dir: default_backup_dir(),
            interval_hours: default_interval_hours(),
            retention_count: default_retention_count(),
            encryption_enabled: true,
            compression_enabled: true,
            compression_level: default_compression_level(),
            verify_after_create: true,
        }
    }
}

impl Settings {
    /// Load settings from a JSON or YAML file, chosen by extension
    pub fn load(path: &Path) -> SnapvaultResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SnapvaultError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("json") => Self::from_json(&contents),
            Some("yaml") | Some("yml") => Self::from_yaml(&contents),
            _ => Err(SnapvaultError::Config(format!(
                "Unsupported config format: {} (expected .json, .yaml or .yml)",
                path.display()
            ))),
        }
    }

    /// Parse settings from a JSON document
    pub fn from_json(contents: &str) -> SnapvaultResult<Self> {
        serde_json::from_str(contents)
            .map_err(|e| SnapvaultError::Config(format!("Failed to parse JSON config: {}", e)))
    }

    /// Parse settings from a YAML document
    pub fn from_yaml(contents: &str) -> SnapvaultResult<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| SnapvaultError::Config(format!("Failed to parse YAML config: {}", e)))
    }

    /// Validate the settings into the configuration the core consumes
    pub fn validate(&self) -> SnapvaultResult<SnapshotConfig> {
        if self.retention_count < 1 {
            return Err(SnapvaultError::InvalidPolicy(format!(
                "retention_count must be at least 1, got {}",
                self.retention_count
            )));
        }
        let retention = RetentionPolicy::new(self.retention_count as usize)?;

        let level = self.compression_level;
        if level < MIN_COMPRESSION_LEVEL as i64 || level > MAX_COMPRESSION_LEVEL as i64 {
            return Err(SnapvaultError::InvalidPolicy(format!(
                "compression_level must be between {} and {}, got {}",
                MIN_COMPRESSION_LEVEL, MAX_COMPRESSION_LEVEL, level
            )));
        }

        if !self.interval_hours.is_finite() || self.interval_hours <= 0.0 {
            return Err(SnapvaultError::InvalidPolicy(format!(
                "interval_hours must be positive, got {}",
                self.interval_hours
            )));
        }

        Ok(SnapshotConfig {
            source_dir: self.source_dir.clone(),
            backup_dir: self.backup_dir.clone(),
            interval: Duration::from_secs_f64(self.interval_hours * 3600.0),
            retention,
            encryption_enabled: self.encryption_enabled,
            compression_level: if self.compression_enabled {
                level as u32
            } else {
                0
            },
            verify_after_create: self.verify_after_create,
        })
    }
}

/// Validated configuration for one source/backup directory pair
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub source_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub interval: Duration,
    pub retention: RetentionPolicy,
    pub encryption_enabled: bool,
    /// 0 stores the archive uncompressed
    pub compression_level: u32,
    pub verify_after_create: bool,
}

impl SnapshotConfig {
    /// Configuration with default settings for the given directories
    pub fn new(source_dir: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            backup_dir: backup_dir.into(),
            interval: Duration::from_secs(24 * 3600),
            retention: RetentionPolicy::default(),
            encryption_enabled: true,
            compression_level: default_compression_level() as u32,
            verify_after_create: true,
        }
    }

    /// Set the retention policy
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Enable or disable encryption
    pub fn with_encryption(mut self, enabled: bool) -> Self {
        self.encryption_enabled = enabled;
        self
    }

    /// Set the compression level, rejecting values outside 0..=9
    pub fn with_compression_level(mut self, level: u32) -> SnapvaultResult<Self> {
        if level > MAX_COMPRESSION_LEVEL {
            return Err(SnapvaultError::InvalidPolicy(format!(
                "compression_level must be at most {}, got {}",
                MAX_COMPRESSION_LEVEL, level
            )));
        }
        self.compression_level = level;
        Ok(self)
    }
}

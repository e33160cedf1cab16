//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the backup manager.

pub mod snapshot;

use std::path::PathBuf;

use clap::Args;

use crate::config::settings::Settings;
use crate::error::SnapvaultResult;

pub use snapshot::{handle_snapshot_command, SnapshotCommands};

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file (.json, .yaml or .yml)
    #[arg(long, global = true, env = "SNAPVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory to snapshot
    #[arg(long, global = true)]
    pub source: Option<PathBuf>,

    /// Directory snapshots are stored in
    #[arg(long, global = true)]
    pub backup_dir: Option<PathBuf>,

    /// Number of snapshots to keep
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub keep: Option<i64>,

    /// Compression level (1-9)
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub level: Option<i64>,

    /// Store snapshots unencrypted
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Store archives uncompressed
    #[arg(long, global = true)]
    pub no_compress: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

impl GlobalArgs {
    /// Load the configuration file, if any, and apply flag overrides
    pub fn resolve_settings(&self) -> SnapvaultResult<Settings> {
        let settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        Ok(self.apply(settings))
    }

    /// Apply flag overrides on top of `settings`
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(source) = &self.source {
            settings.source_dir = source.clone();
        }
        if let Some(backup_dir) = &self.backup_dir {
            settings.backup_dir = backup_dir.clone();
        }
        if let Some(keep) = self.keep {
            settings.retention_count = keep;
        }
        if let Some(level) = self.level {
            settings.compression_level = level;
        }
        if self.no_encrypt {
            settings.encryption_enabled = false;
        }
        if self.no_compress {
            settings.compression_enabled = false;
        }
        settings
    }
}

//! Configuration module for snapvault
//!
//! This module provides:
//! - Backup directory layout (`paths`)
//! - Settings loading from JSON/YAML and validation (`settings`)

pub mod paths;
pub mod settings;

pub use paths::BackupPaths;
pub use settings::{Settings, SnapshotConfig};

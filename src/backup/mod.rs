//! Snapshot lifecycle for snapvault
//!
//! # Architecture
//!
//! - `BackupManager`: creates, rotates, deletes, and lists snapshots
//! - `RestoreManager`: restores and verifies stored snapshots
//! - `reconcile`: repairs disagreement between the manifest and the directory
//! - `naming`: generated and custom snapshot names
//!
//! # Pipeline
//!
//! A snapshot moves through these stages while the directory's exclusive
//! lock is held:
//!
//! 1. Archiving: the source tree is packed into a gzip tar stream
//! 2. Encrypting: the archive is sealed with AES-256-GCM
//! 3. Writing: the result is written to a temp file and renamed into place
//! 4. Hashing: the stored bytes are digested and optionally re-verified
//! 5. Recording: the snapshot is appended to the manifest
//! 6. Rotating: snapshots beyond the retention count are deleted, oldest first
//!
//! # Example
//!
//! ```rust,ignore
//! use snapvault::backup::BackupManager;
//! use snapvault::config::SnapshotConfig;
//!
//! let manager = BackupManager::new(SnapshotConfig::new("./data", "./backups"))?;
//! let report = manager.create_snapshot()?;
//!
//! // Later, restore it
//! manager.restore_snapshot(&report.record.name, "./restored".as_ref())?;
//! ```

mod manager;
pub mod naming;
pub mod reconcile;
mod restore;

pub use manager::{BackupManager, SnapshotReport, Stage};
pub use reconcile::ReconcileReport;
pub use restore::RestoreManager;

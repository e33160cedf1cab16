//! snapvault - encrypted snapshot lifecycle for a directory
//!
//! This library archives a source directory into a deterministic gzip tar
//! stream, seals it with AES-256-GCM, stores it atomically in a backup
//! directory, records it in a JSON manifest with its SHA-256 digest, and
//! rotates old snapshots out FIFO.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `archive`: Deterministic tar/gzip packing and atomic extraction
//! - `backup`: Snapshot pipeline, restore, and reconciliation
//! - `cli`: Command handlers for the `snapvault` binary
//! - `config`: Settings, validation, and backup directory layout
//! - `crypto`: Authenticated encryption and the key file
//! - `error`: Custom error types
//! - `integrity`: SHA-256 hashing and verification
//! - `lock`: Advisory directory locks
//! - `logging`: tracing subscriber setup
//! - `models`: Snapshot records
//! - `rotation`: FIFO retention
//! - `scheduler`: Periodic snapshots
//! - `storage`: Atomic JSON storage and the manifest
//!
//! # Example
//!
//! ```rust,ignore
//! use snapvault::backup::BackupManager;
//! use snapvault::config::Settings;
//!
//! let config = Settings::load("snapvault.yaml".as_ref())?.validate()?;
//! let manager = BackupManager::new(config)?;
//! let report = manager.create_snapshot()?;
//! assert!(manager.verify_integrity(&report.record.name)?);
//! ```

pub mod archive;
pub mod backup;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod integrity;
pub mod lock;
pub mod logging;
pub mod models;
pub mod rotation;
pub mod scheduler;
pub mod storage;

pub use error::SnapvaultError;

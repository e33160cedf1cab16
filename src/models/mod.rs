//! Core data models for snapvault
//!
//! Snapshot records are the only persisted model: one per stored snapshot,
//! kept in the manifest.

pub mod snapshot;

pub use snapshot::SnapshotRecord;

//! Storage layer for snapvault
//!
//! Provides JSON file storage with atomic writes for the snapshot manifest.

pub mod file_io;
pub mod manifest;

pub use file_io::{read_json, write_json_atomic};
pub use manifest::ManifestStore;

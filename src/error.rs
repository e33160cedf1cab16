//! Custom error types for snapvault
//!
//! This module defines the error hierarchy for the snapshot pipeline using
//! thiserror for ergonomic error definitions.

use thiserror::Error;

/// The main error type for snapvault operations
#[derive(Error, Debug)]
pub enum SnapvaultError {
    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// YAML serialization/deserialization errors
    #[error("YAML error: {0}")]
    Yaml(String),

    /// Unreadable source tree, or malformed archive data on restore
    #[error("Archive error: {0}")]
    Archive(String),

    /// Key file unreadable, malformed, or unwritable
    #[error("Key access error: {0}")]
    KeyAccess(String),

    /// Encryption could not be performed
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Authentication tag did not verify (tampered data or wrong key)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rejected retention count or other out-of-range setting
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Duplicate entity errors
    #[error("{entity_type} already exists: {identifier}")]
    Duplicate {
        entity_type: &'static str,
        identifier: String,
    },

    /// Another process holds the backup directory lock
    #[error("Backup directory is busy: {0}")]
    Busy(String),

    /// A freshly written snapshot did not match its own digest
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Manifest storage errors
    #[error("Storage error: {0}")]
    Storage(String),
}

impl SnapvaultError {
    /// Create a "not found" error for snapshots
    pub fn snapshot_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Snapshot",
            identifier: identifier.into(),
        }
    }

    /// Create a "duplicate" error for snapshots
    pub fn duplicate_snapshot(identifier: impl Into<String>) -> Self {
        Self::Duplicate {
            entity_type: "Snapshot",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a busy-lock error
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }

    /// Check if this is an authentication failure
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Check if this is an invalid policy error
    pub fn is_invalid_policy(&self) -> bool {
        matches!(self, Self::InvalidPolicy(_))
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for SnapvaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SnapvaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for SnapvaultError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err.to_string())
    }
}

/// Result type alias for snapvault operations
pub type SnapvaultResult<T> = Result<T, SnapvaultError>;

//! Snapshot model
//!
//! One record per successfully stored snapshot. Records are immutable once
//! written to the manifest.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata about a stored snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Unique snapshot name (e.g. `backup_20250101_120000`)
    pub name: String,

    /// When the snapshot was created
    pub created_at: DateTime<Utc>,

    /// Size of the stored file in bytes
    pub size_bytes: u64,

    /// Hex SHA-256 of the stored file
    pub content_hash: String,

    /// File name inside the backup directory
    pub file_name: String,

    /// Whether the stored file is an encrypted envelope
    #[serde(default = "default_encrypted")]
    pub encrypted: bool,

    /// Number of files archived (unknown for adopted snapshots)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_count: Option<usize>,

    /// Whether the record was rebuilt by reconciliation
    #[serde(default, skip_serializing_if = "is_false")]
    pub adopted: bool,
}

fn default_encrypted() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl SnapshotRecord {
    /// Chronological ordering: creation time, then name
    pub fn chronological_cmp(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.name.cmp(&other.name))
    }

    /// Short form of the content hash for display
    pub fn short_hash(&self) -> &str {
        let end = self.content_hash.len().min(16);
        &self.content_hash[..end]
    }
}

impl fmt::Display for SnapshotRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} bytes, sha256:{})",
            self.name,
            self.size_bytes,
            self.short_hash()
        )
    }
}

//! FIFO retention
//!
//! Rotation keeps the newest `keep` snapshots and selects everything older
//! for deletion, oldest first. Deleting in that order means an interrupted
//! rotation never removes a newer snapshot while an older one survives.

use crate::error::{SnapvaultError, SnapvaultResult};
use crate::models::SnapshotRecord;

/// Default number of snapshots kept
pub const DEFAULT_KEEP: usize = 5;

/// How many snapshots rotation keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    keep: usize,
}

impl RetentionPolicy {
    /// Create a policy, rejecting `keep == 0`
    pub fn new(keep: usize) -> SnapvaultResult<Self> {
        if keep == 0 {
            return Err(SnapvaultError::InvalidPolicy(
                "retention count must be at least 1".to_string(),
            ));
        }
        Ok(Self { keep })
    }

    /// Number of snapshots kept
    pub fn keep(&self) -> usize {
        self.keep
    }

    /// Select records for deletion under this policy
    pub fn select(&self, records: &[SnapshotRecord]) -> Vec<SnapshotRecord> {
        let mut ordered = records.to_vec();
        ordered.sort_by(SnapshotRecord::chronological_cmp);

        let excess = ordered.len().saturating_sub(self.keep);
        ordered.truncate(excess);
        ordered
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { keep: DEFAULT_KEEP }
    }
}

/// Select all but the newest `keep` records, oldest first
pub fn select_for_deletion(
    records: &[SnapshotRecord],
    keep: usize,
) -> SnapvaultResult<Vec<SnapshotRecord>> {
    Ok(RetentionPolicy::new(keep)?.select(records))
}

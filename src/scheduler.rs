//! Periodic snapshots
//!
//! The scheduler calls `create_snapshot` at a fixed interval until it is
//! told to stop. It keeps no state of its own beyond counters: every run
//! goes through the manager's public API and its directory lock.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::backup::BackupManager;

/// Counts of scheduled run outcomes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Runs skipped because another operation held the directory
    pub skipped_busy: usize,
}

impl ScheduleSummary {
    /// Total runs attempted
    pub fn runs(&self) -> usize {
        self.succeeded + self.failed + self.skipped_busy
    }
}

/// Runs snapshots on a fixed interval
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    max_runs: Option<usize>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_runs: None,
        }
    }

    /// Stop after `max_runs` attempts
    pub fn with_max_runs(mut self, max_runs: usize) -> Self {
        self.max_runs = Some(max_runs);
        self
    }

    /// Run until `shutdown` receives a message or is disconnected
    ///
    /// A failed run is logged and counted; the loop keeps going.
    pub fn run(&self, manager: &BackupManager, shutdown: Receiver<()>) -> ScheduleSummary {
        let mut summary = ScheduleSummary::default();
        info!(interval_secs = self.interval.as_secs_f64(), "Scheduler started");

        loop {
            match manager.create_snapshot() {
                Ok(report) => {
                    info!(
                        name = %report.record.name,
                        sha256 = %report.record.content_hash,
                        "Scheduled snapshot complete"
                    );
                    summary.succeeded += 1;
                }
                Err(e) if e.is_busy() => {
                    warn!("Backup directory busy, skipping this run");
                    summary.skipped_busy += 1;
                }
                Err(e) => {
                    error!(error = %e, "Scheduled snapshot failed");
                    summary.failed += 1;
                }
            }

            if self.max_runs.is_some_and(|max| summary.runs() >= max) {
                break;
            }

            match shutdown.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped_busy = summary.skipped_busy,
            "Scheduler stopped"
        );
        summary
    }
}

//! Snapshot CLI commands
//!
//! Implements CLI commands for snapshot management.

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use clap::Subcommand;

use crate::backup::BackupManager;
use crate::error::{SnapvaultError, SnapvaultResult};
use crate::scheduler::Scheduler;

/// Snapshot subcommands
#[derive(Subcommand, Debug)]
pub enum SnapshotCommands {
    /// Take a snapshot of the source directory
    Create {
        /// Custom snapshot name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Restore a snapshot into an empty or new directory
    Restore {
        /// Snapshot name (use 'latest' for most recent)
        name: String,

        /// Directory to restore into
        target: PathBuf,
    },

    /// Check a stored snapshot against its recorded digest
    Verify {
        /// Snapshot name (use 'latest' for most recent)
        name: String,
    },

    /// List all snapshots
    List {
        /// Show detailed information
        #[arg(short, long)]
        verbose: bool,
    },

    /// Delete snapshots beyond the retention count
    Cleanup,

    /// Delete a single snapshot
    Delete {
        /// Snapshot name
        name: String,
    },

    /// Repair disagreement between the manifest and the backup directory
    Reconcile,

    /// Take snapshots periodically
    Schedule {
        /// Hours between snapshots (overrides configuration)
        #[arg(long)]
        interval_hours: Option<f64>,

        /// Stop after this many runs
        #[arg(long)]
        max_runs: Option<usize>,
    },
}

/// Handle a snapshot command
pub fn handle_snapshot_command(manager: &BackupManager, cmd: SnapshotCommands) -> SnapvaultResult<()> {
    match cmd {
        SnapshotCommands::Create { name } => {
            println!("Creating snapshot...");
            let report = match name {
                Some(name) => manager.create_named_snapshot(&name)?,
                None => manager.create_snapshot()?,
            };
            let record = &report.record;

            println!("Snapshot created: {}", record.name);
            println!("Location: {}", manager.snapshot_path(record).display());
            println!("Size: {}", format_size(record.size_bytes));
            println!("SHA-256: {}", record.content_hash);

            if !report.skipped.is_empty() {
                println!();
                println!("Skipped entries ({}):", report.skipped.len());
                for entry in &report.skipped {
                    println!("  {} ({})", entry.path.display(), entry.reason);
                }
            }
            for rotated in &report.rotated {
                println!("Rotated out: {}", rotated.name);
            }
        }

        SnapshotCommands::Restore { name, target } => {
            let name = resolve_name(manager, &name)?;
            println!("Restoring {}...", name);
            let dest = manager.restore_snapshot(&name, &target)?;
            println!("Restored {} to {}", name, dest.display());
        }

        SnapshotCommands::Verify { name } => {
            let name = resolve_name(manager, &name)?;
            if manager.verify_integrity(&name)? {
                println!("{}: OK", name);
            } else {
                println!("{}: FAILED", name);
                return Err(SnapvaultError::Integrity(format!(
                    "{} does not match its recorded digest",
                    name
                )));
            }
        }

        SnapshotCommands::List { verbose } => {
            let snapshots = manager.list_snapshots()?;

            if snapshots.is_empty() {
                println!("No snapshots found.");
                println!("Create one with: snapvault create");
                return Ok(());
            }

            println!("Available Snapshots");
            println!("===================");
            println!();

            for (i, snapshot) in snapshots.iter().enumerate() {
                let age = chrono::Utc::now().signed_duration_since(snapshot.created_at);
                let age_str = format_duration(age);
                let mut markers = String::new();
                if !snapshot.encrypted {
                    markers.push_str(" [unencrypted]");
                }
                if snapshot.adopted {
                    markers.push_str(" [adopted]");
                }

                if verbose {
                    println!(
                        "{}. {}{}\n   File: {}\n   Created: {}\n   Size: {}\n   Files: {}\n   SHA-256: {}\n   Age: {}\n",
                        i + 1,
                        snapshot.name,
                        markers,
                        snapshot.file_name,
                        snapshot.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                        format_size(snapshot.size_bytes),
                        snapshot
                            .file_count
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| "unknown".to_string()),
                        snapshot.content_hash,
                        age_str,
                    );
                } else {
                    println!(
                        "  {}. {} ({} ago, {}){}",
                        i + 1,
                        snapshot.name,
                        age_str,
                        format_size(snapshot.size_bytes),
                        markers,
                    );
                }
            }

            println!();
            println!("Total: {} snapshot(s)", snapshots.len());
        }

        SnapshotCommands::Cleanup => {
            let deleted = manager.cleanup_old_snapshots()?;
            if deleted.is_empty() {
                println!("No snapshots to clean up.");
                println!(
                    "Current retention policy: keep {}",
                    manager.config().retention.keep()
                );
                return Ok(());
            }
            for record in &deleted {
                println!("Deleted: {}", record.name);
            }
            println!("Deleted {} snapshot(s).", deleted.len());
        }

        SnapshotCommands::Delete { name } => {
            let record = manager.delete_snapshot(&name)?;
            println!("Deleted: {}", record.name);
        }

        SnapshotCommands::Reconcile => {
            let report = manager.reconcile()?;
            if report.is_clean() {
                println!("Manifest and backup directory agree.");
                return Ok(());
            }
            for record in &report.adopted {
                println!("Adopted: {}", record.name);
            }
            for record in &report.dropped {
                println!("Dropped missing: {}", record.name);
            }
            for path in &report.removed_temp_files {
                println!("Removed temp file: {}", path.display());
            }
            for path in &report.flagged {
                println!("Needs review: {}", path.display());
            }
        }

        SnapshotCommands::Schedule {
            interval_hours,
            max_runs,
        } => {
            let interval = match interval_hours {
                Some(hours) if hours.is_finite() && hours > 0.0 => {
                    Duration::from_secs_f64(hours * 3600.0)
                }
                Some(hours) => {
                    return Err(SnapvaultError::InvalidPolicy(format!(
                        "interval_hours must be positive, got {}",
                        hours
                    )))
                }
                None => manager.config().interval,
            };

            let mut scheduler = Scheduler::new(interval);
            if let Some(max_runs) = max_runs {
                scheduler = scheduler.with_max_runs(max_runs);
            }

            // The sender stays alive so only max_runs or process exit ends the loop
            let (_shutdown, rx) = mpsc::channel();
            println!(
                "Scheduling snapshots every {}",
                format_duration(chrono::Duration::seconds(interval.as_secs() as i64))
            );
            let summary = scheduler.run(manager, rx);
            println!(
                "Runs: {} succeeded, {} failed, {} skipped (busy)",
                summary.succeeded, summary.failed, summary.skipped_busy
            );
        }
    }

    Ok(())
}

/// Resolve a snapshot name, handling the "latest" keyword
fn resolve_name(manager: &BackupManager, name: &str) -> SnapvaultResult<String> {
    if name.eq_ignore_ascii_case("latest") {
        return manager
            .latest_snapshot()?
            .map(|record| record.name)
            .ok_or_else(|| SnapvaultError::snapshot_not_found("latest"));
    }
    Ok(name.to_string())
}

/// Format a duration in human-readable form
pub fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds();

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    let months = days / 30;
    format!("{}mo", months)
}

/// Format a file size in human-readable form
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

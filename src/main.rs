use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use snapvault::backup::BackupManager;
use snapvault::cli::{handle_snapshot_command, GlobalArgs, SnapshotCommands};

#[derive(Parser)]
#[command(
    name = "snapvault",
    author = "Kaylee Beyene",
    version,
    about = "Encrypted, rotated snapshots of a directory",
    long_about = "snapvault archives a source directory into compressed, AES-256-GCM \
                  encrypted snapshots, records each one with its SHA-256 digest, and \
                  keeps only the newest N. Snapshots can be verified and restored."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Snapshot(SnapshotCommands),

    /// Show the resolved configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    snapvault::logging::init(&cli.global.log_level)?;

    let settings = cli.global.resolve_settings()?;
    let config = settings.validate()?;

    match cli.command {
        Commands::Config => {
            println!("snapvault Configuration");
            println!("=======================");
            if let Some(path) = &cli.global.config {
                println!("Config file:      {}", path.display());
            }
            println!("Source directory: {}", config.source_dir.display());
            println!("Backup directory: {}", config.backup_dir.display());
            println!();
            println!("Settings:");
            println!("  Interval:          {} hour(s)", settings.interval_hours);
            println!("  Retention count:   {}", config.retention.keep());
            println!("  Encryption:        {}", config.encryption_enabled);
            println!("  Compression level: {}", config.compression_level);
            println!("  Verify on create:  {}", config.verify_after_create);
        }
        Commands::Snapshot(cmd) => {
            let manager = BackupManager::new(config)?;
            if !matches!(cmd, SnapshotCommands::Reconcile) {
                reconcile_on_startup(&manager);
            }
            handle_snapshot_command(&manager, cmd)?;
        }
    }

    Ok(())
}

/// Opportunistic repair; never blocks or fails the requested command
fn reconcile_on_startup(manager: &BackupManager) {
    match manager.reconcile() {
        Ok(report) if report.is_clean() => {}
        Ok(report) => info!(
            adopted = report.adopted.len(),
            dropped = report.dropped.len(),
            removed_temp_files = report.removed_temp_files.len(),
            flagged = report.flagged.len(),
            "Reconciled backup directory"
        ),
        Err(e) if e.is_busy() => debug!("Backup directory busy, skipping reconciliation"),
        Err(e) => warn!(error = %e, "Reconciliation failed"),
    }
}

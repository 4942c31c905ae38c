//! Backup Runner - Main entry point
//!
//! Runs every backup instruction once, then optionally powers the host off.

use anyhow::Result;
use backup_runner::daemon::shutdown::{CountdownOutcome, ShutdownCountdown};
use backup_runner::executor::{RowStatus, RunSummary};
use backup_runner::utils::format::{format_bytes, format_duration};
use backup_runner::{instructions, utils, BackupExecutor, Config, EngineSettings};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Instruction file (overrides config)
    #[arg(short, long, value_name = "FILE")]
    instructions: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Never power off, even if every instruction asks for it
    #[arg(long)]
    no_shutdown: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = if let Some(config_path) = &args.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    let log_dir = config
        .log
        .dir
        .as_deref()
        .filter(|dir| !dir.as_os_str().is_empty());
    let log_file = utils::logger::init(log_level, log_dir)?;

    tracing::info!("Starting backup-runner v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &log_file {
        tracing::info!("Writing log to {}", path.display());
    }

    let settings = EngineSettings::from_config(&config.engine)?;
    tracing::info!(
        "Hash algorithm: {}, directory method: {}, max snapshots: {}",
        settings.algorithm,
        settings.directory_method,
        settings.max_snapshots
    );

    let instructions_path = args
        .instructions
        .clone()
        .unwrap_or_else(|| config.instructions.file.clone());
    let instructions = instructions::load(&instructions_path);

    // The engine is synchronous file I/O; keep it off the async workers
    let executor = BackupExecutor::new(settings);
    let summary = tokio::task::spawn_blocking(move || executor.run_all(&instructions)).await?;

    print_summary(&summary);

    if summary.shutdown_requested() {
        if args.no_shutdown {
            tracing::info!(
                "Every activated instruction asks for power-off; skipped (--no-shutdown)"
            );
        } else {
            let countdown = ShutdownCountdown::new(
                config.shutdown.countdown_secs,
                config.shutdown.command.clone(),
            );
            match countdown.run().await {
                CountdownOutcome::PoweredOff => tracing::info!("Power-off requested"),
                CountdownOutcome::Cancelled => println!("Power-off cancelled."),
                CountdownOutcome::CommandFailed(reason) => {
                    tracing::error!("Power-off failed: {}", reason)
                }
            }
        }
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    if summary.rows.is_empty() {
        println!("No backup instructions found.");
        return;
    }

    for row in &summary.rows {
        match &row.status {
            RowStatus::Completed => println!(
                "[{}] {} -> {}: {} item(s), {} in {}{}",
                row.index,
                row.source.display(),
                row.snapshot.as_ref().unwrap_or(&row.destination).display(),
                row.items_transferred,
                format_bytes(row.bytes_transferred),
                format_duration(row.duration),
                if row.items_failed > 0 {
                    format!(", {} failed (see manifest)", row.items_failed)
                } else {
                    String::new()
                }
            ),
            RowStatus::Skipped => {
                println!("[{}] {}: not activated", row.index, row.source.display())
            }
            RowStatus::Failed(e) => {
                println!("[{}] {}: FAILED - {}", row.index, row.source.display(), e)
            }
        }
    }

    println!(
        "{} completed, {} skipped, {} failed",
        summary.completed(),
        summary.skipped(),
        summary.failed()
    );
}

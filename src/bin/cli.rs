//! Timetable Sync daemon
//!
//! Runs the probe and full-sync cadences for every enabled source until
//! interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use timetable_sync::{
    config::load_config, error::Result, scheduler::Engine, storage::LocalStorage,
};

/// timetable-sync - Schedule Synchronization Engine
#[derive(Parser, Debug)]
#[command(
    name = "timetable-sync",
    version,
    about = "Keeps stored class schedules in sync with institution websites"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Run one full sync for every enabled source and exit
    #[arg(long, conflicts_with = "check")]
    once: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the daemon.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            return Err(e);
        }
    };
    log::info!(
        "Loaded {} source(s) from {}",
        config.sources.len(),
        cli.config.display()
    );

    if cli.check {
        for source in &config.sources {
            log::info!(
                "✓ {} ({}){}",
                source.id,
                source.name,
                if source.enabled { "" } else { " [disabled]" }
            );
        }
        log::info!("Config OK");
        return Ok(());
    }

    let store = Arc::new(LocalStorage::new(&config.store.root_dir));
    let engine = Engine::from_config(&config, store)?;

    if cli.once {
        let mut failed = 0;
        for (source_id, result) in engine.sync_all_once().await {
            match result {
                Ok(report) => log::info!(
                    "[{source_id}] {} lessons, {} baseline lessons{}",
                    report.lesson_count,
                    report.baseline_count,
                    if report.wrote() { "" } else { " (nothing written)" }
                ),
                Err(e) => {
                    failed += 1;
                    log::error!("[{source_id}] sync failed: {e}");
                }
            }
        }
        log::info!("Done!");
        return if failed == 0 {
            Ok(())
        } else {
            Err(timetable_sync::error::AppError::store(format!(
                "{failed} source(s) failed to sync"
            )))
        };
    }

    log::info!("Seeding {} source(s)...", engine.source_ids().count());
    engine.start().await?;
    log::info!("Scheduler running. Press Ctrl-C to stop.");

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down...");
    engine.shutdown().await?;

    Ok(())
}

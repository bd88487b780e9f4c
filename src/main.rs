//! Recipe-Harvest main entry point
//!
//! This is the command-line interface for the Recipe-Harvest crawler.

use clap::{Parser, Subcommand};
use recipe_harvest::config::{load_config_with_hash, Config};
use recipe_harvest::crawler::{
    run_harvest, run_url_check, CrawlSummary, HarvestOptions, UrlCheckOptions,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Recipes attempted per run when no explicit cap or end ID is given
const DEFAULT_HARVEST_COUNT: u64 = 1500;

/// Recipe-Harvest: a resumable recipe ingestion crawler
///
/// Recipe-Harvest fetches recipe records from a rate-limited remote API,
/// persists them to SQLite with full raw-response audit rows, and
/// revalidates recipe source URLs on an adaptive retry schedule.
#[derive(Parser, Debug)]
#[command(name = "recipe-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable recipe ingestion crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest recipe records from the remote API
    Harvest {
        /// First recipe ID to attempt (defaults to one past the highest known)
        #[arg(long)]
        start_id: Option<i64>,

        /// Last recipe ID to attempt (inclusive)
        #[arg(long)]
        end_id: Option<i64>,

        /// Cap on recipes attempted this run
        #[arg(long)]
        max_count: Option<u64>,

        /// Override the configured batch size
        #[arg(long)]
        batch_size: Option<u32>,

        /// Override the configured worker cap
        #[arg(long)]
        max_workers: Option<u32>,

        /// Reset failed targets to pending before harvesting
        #[arg(long)]
        force_retry: bool,
    },

    /// Revalidate recipe source URLs
    VerifyUrls {
        /// First recipe ID whose URL to check (inclusive)
        #[arg(long)]
        start_id: Option<i64>,

        /// Last recipe ID whose URL to check (inclusive)
        #[arg(long)]
        end_id: Option<i64>,

        /// Also revalidate URLs that already succeeded
        #[arg(long)]
        check_all: bool,

        /// Override the configured batch size
        #[arg(long)]
        batch_size: Option<u32>,

        /// Override the configured worker cap
        #[arg(long)]
        max_workers: Option<u32>,

        /// Reset failed targets to pending before checking
        #[arg(long)]
        force_retry: bool,
    },

    /// Show statistics from the database and exit
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Harvest {
            start_id,
            end_id,
            max_count,
            batch_size,
            max_workers,
            force_retry,
        } => {
            let config = apply_overrides(config, batch_size, max_workers);

            // An open-ended harvest still stops somewhere: cap it at the
            // default count unless the caller bounded it themselves
            let max_count = match (max_count, end_id) {
                (Some(count), _) => Some(count),
                (None, Some(_)) => None,
                (None, None) => Some(DEFAULT_HARVEST_COUNT),
            };

            let options = HarvestOptions {
                start_id,
                end_id,
                max_count,
                force_retry,
            };

            tracing::info!("Starting recipe harvest");
            let summary = run_harvest(config, &config_hash, options, stop_flag()).await?;
            report_summary(&summary);
        }

        Command::VerifyUrls {
            start_id,
            end_id,
            check_all,
            batch_size,
            max_workers,
            force_retry,
        } => {
            let config = apply_overrides(config, batch_size, max_workers);
            let options = UrlCheckOptions {
                start_id,
                end_id,
                check_all,
                force_retry,
            };

            tracing::info!("Starting source-URL revalidation");
            let summary = run_url_check(config, &config_hash, options, stop_flag()).await?;
            report_summary(&summary);
        }

        Command::Stats => handle_stats(&config)?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("recipe_harvest=info,warn"),
            1 => EnvFilter::new("recipe_harvest=debug,info"),
            2 => EnvFilter::new("recipe_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Applies CLI overrides on top of the loaded configuration
fn apply_overrides(mut config: Config, batch_size: Option<u32>, max_workers: Option<u32>) -> Config {
    if let Some(batch_size) = batch_size {
        config.crawler.batch_size = batch_size.max(1);
    }
    if let Some(max_workers) = max_workers {
        config.crawler.max_workers = max_workers.clamp(1, 100);
    }
    config
}

/// Spawns the Ctrl-C listener and returns the shared stop flag
fn stop_flag() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received; finishing current batch before stopping");
            flag.store(true, Ordering::SeqCst);
        }
    });

    stop
}

/// Prints the run summary after a crawl finishes
fn report_summary(summary: &CrawlSummary) {
    if summary.stopped {
        println!("\nRun interrupted; progress is saved and the next run resumes it.");
    }

    println!("\n=== Run Summary ===");
    println!("  Attempted: {}", summary.attempted);
    println!("  Succeeded: {}", summary.succeeded);
    println!("  Scheduled for retry: {}", summary.retried);
    println!("  Permanently failed: {}", summary.permanently_failed);
    if summary.deferred > 0 {
        println!("  Deferred (store failures): {}", summary.deferred);
    }
}

/// Handles the stats subcommand: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use recipe_harvest::output::{load_statistics, print_statistics};
    use recipe_harvest::storage::SqliteStorage;

    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

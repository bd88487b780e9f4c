//! Crawl engine for recipe harvesting and source-URL revalidation
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching and attempt classification
//! - The fetch-parse-persist pipeline
//! - Target space enumeration and batch claiming
//! - Batch dispatch under a bounded worker pool

mod dispatcher;
mod fetcher;
mod pipeline;
mod targets;

pub use dispatcher::{CrawlSummary, Dispatcher};
pub use fetcher::{build_http_client, check_url, fetch_recipe, image_file_extension, RecipeFetch, UrlCheck};
pub use pipeline::Pipeline;
pub use targets::TargetSpace;

use crate::config::Config;
use crate::state::TargetKind;
use crate::storage::{open_storage, RunStatus, SqliteStorage, Storage};
use crate::HarvestError;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

/// Per-run options for the recipe harvest crawl
#[derive(Debug, Clone, Default)]
pub struct HarvestOptions {
    /// First recipe ID to attempt; auto-detected from the store when unset
    pub start_id: Option<i64>,

    /// Last recipe ID to attempt (inclusive)
    pub end_id: Option<i64>,

    /// Cap on the number of targets attempted this run
    pub max_count: Option<u64>,

    /// Reset failed targets before crawling
    pub force_retry: bool,
}

/// Per-run options for the source-URL revalidation crawl
#[derive(Debug, Clone, Default)]
pub struct UrlCheckOptions {
    /// First recipe ID whose URL to check (inclusive)
    pub start_id: Option<i64>,

    /// Last recipe ID whose URL to check (inclusive)
    pub end_id: Option<i64>,

    /// Also revalidate URLs that already succeeded
    pub check_all: bool,

    /// Reset failed targets before checking
    pub force_retry: bool,
}

/// Runs the recipe harvest crawl
///
/// Opens the store, resets failed targets if requested, resolves the
/// starting ID, and drives the dispatcher over the ID-range target space.
///
/// # Arguments
///
/// * `config` - The crawl configuration
/// * `config_hash` - Hash of the configuration file, recorded on the run
/// * `options` - Per-run options
/// * `stop` - Cooperative stop flag; no new batches start once set
pub async fn run_harvest(
    config: Config,
    config_hash: &str,
    options: HarvestOptions,
    stop: Arc<AtomicBool>,
) -> Result<CrawlSummary, HarvestError> {
    let mut storage = open_storage(Path::new(&config.output.database_path))?;

    if options.force_retry {
        let reset = storage.reset_failed_targets(TargetKind::Recipe, options.start_id, options.end_id)?;
        tracing::info!("Force-retry reset {} failed targets", reset);
    }

    // With no explicit start, resume from the oldest target still awaiting
    // a terminal status so an interrupted run re-attempts its stranded
    // claims; only when everything is settled move past the high-water mark
    let start_id = match options.start_id {
        Some(id) => id,
        None => match storage.min_unsettled_target_id(TargetKind::Recipe)? {
            Some(id) => {
                tracing::info!("Resuming from unsettled recipe ID {}", id);
                id
            }
            None => {
                let next = storage.max_target_id(TargetKind::Recipe)?.unwrap_or(0) + 1;
                tracing::info!("Auto-starting from recipe ID {}", next);
                next
            }
        },
    };

    let run_id = storage.create_run(TargetKind::Recipe, config_hash)?;
    let storage = Arc::new(Mutex::new(storage));

    let space = TargetSpace::id_range(start_id, options.end_id);
    let mut dispatcher = Dispatcher::new(
        Arc::new(config),
        Arc::clone(&storage),
        TargetKind::Recipe,
        space,
        options.max_count,
        stop,
    )?;

    let summary = dispatcher.run().await;
    finish_run(&storage, run_id, &summary);
    summary
}

/// Runs the source-URL revalidation crawl
///
/// Backfills status rows for recipes that don't have one yet, then drives
/// the dispatcher over the URL-check target space.
pub async fn run_url_check(
    config: Config,
    config_hash: &str,
    options: UrlCheckOptions,
    stop: Arc<AtomicBool>,
) -> Result<CrawlSummary, HarvestError> {
    let mut storage = open_storage(Path::new(&config.output.database_path))?;

    if options.force_retry {
        let reset =
            storage.reset_failed_targets(TargetKind::SourceUrl, options.start_id, options.end_id)?;
        tracing::info!("Force-retry reset {} failed targets", reset);
    }

    let run_id = storage.create_run(TargetKind::SourceUrl, config_hash)?;
    let storage = Arc::new(Mutex::new(storage));

    let space = TargetSpace::url_checks(options.start_id, options.end_id, options.check_all);
    let mut dispatcher = Dispatcher::new(
        Arc::new(config),
        Arc::clone(&storage),
        TargetKind::SourceUrl,
        space,
        None,
        stop,
    )?;

    let summary = dispatcher.run().await;
    finish_run(&storage, run_id, &summary);
    summary
}

/// Records the run's final status
fn finish_run(
    storage: &Arc<Mutex<SqliteStorage>>,
    run_id: i64,
    summary: &Result<CrawlSummary, HarvestError>,
) {
    let mut storage = match storage.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    let result = match summary {
        Ok(s) if s.stopped => storage.update_run_status(run_id, RunStatus::Interrupted),
        Ok(_) => storage.complete_run(run_id),
        Err(_) => storage.update_run_status(run_id, RunStatus::Failed),
    };

    if let Err(e) = result {
        tracing::error!("Failed to record run status: {}", e);
    }
}

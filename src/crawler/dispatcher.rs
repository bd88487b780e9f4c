//! Batch dispatch under a bounded worker pool
//!
//! The dispatcher owns the batch loop: reconcile abandoned claims, draw and
//! claim a batch, fan the targets out to workers under a semaphore cap, fold
//! each outcome into a status update, pause, repeat. Per-target failures are
//! absorbed by the pipeline; only store-level errors abort the run.

use crate::config::Config;
use crate::crawler::{build_http_client, Pipeline, TargetSpace};
use crate::retry::decide;
use crate::state::{TargetKind, TargetStatus};
use crate::storage::{SqliteStorage, Storage};
use crate::HarvestError;
use chrono::{Duration, Utc};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;
use tokio::time::sleep;

/// Final tallies for one crawl run
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    /// Targets attempted this run
    pub attempted: u64,

    /// Attempts that landed in `succeeded`
    pub succeeded: u64,

    /// Attempts rescheduled for a later retry
    pub retried: u64,

    /// Attempts that exhausted their retry budget or were confirmed absent
    pub permanently_failed: u64,

    /// Attempts returned to pending after a store failure
    pub deferred: u64,

    /// True when the run ended on the cooperative stop flag
    pub stopped: bool,
}

/// Drives a crawl run over one target space
pub struct Dispatcher {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    kind: TargetKind,
    space: TargetSpace,
    max_count: Option<u64>,
    stop: Arc<AtomicBool>,
    pipeline: Arc<Pipeline>,
}

impl Dispatcher {
    /// Creates a dispatcher and its HTTP pipeline
    ///
    /// # Arguments
    ///
    /// * `config` - The crawl configuration
    /// * `storage` - Shared store; one connection guarded by a mutex
    /// * `kind` - The crawl kind, used for reconciliation and tallies
    /// * `space` - The target space this run enumerates
    /// * `max_count` - Cap on targets attempted, if any
    /// * `stop` - Cooperative stop flag; checked between batches
    pub fn new(
        config: Arc<Config>,
        storage: Arc<Mutex<SqliteStorage>>,
        kind: TargetKind,
        space: TargetSpace,
        max_count: Option<u64>,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, HarvestError> {
        let client = build_http_client(
            &config.crawler.user_agent,
            config.api.request_timeout_secs,
        )?;

        if kind == TargetKind::Recipe {
            std::fs::create_dir_all(Path::new(&config.output.image_dir))?;
        }

        let pipeline = Arc::new(Pipeline::new(
            client,
            Arc::clone(&storage),
            Arc::clone(&config),
        ));

        Ok(Self {
            config,
            storage,
            kind,
            space,
            max_count,
            stop,
            pipeline,
        })
    }

    /// Runs the batch loop to completion
    ///
    /// Terminates when the target space is exhausted, the attempt cap is
    /// reached, or the stop flag is set. Returns the run's tallies.
    pub async fn run(&mut self) -> Result<CrawlSummary, HarvestError> {
        let batch_size = self.config.crawler.batch_size as usize;
        let max_attempts = self.config.retry.max_attempts;
        let grace = Duration::minutes(self.config.crawler.claim_grace_minutes);
        let semaphore = Arc::new(Semaphore::new(self.config.crawler.max_workers as usize));

        let mut summary = CrawlSummary::default();
        let mut consecutive_empty = 0u32;

        loop {
            if self.stop.load(Ordering::SeqCst) {
                tracing::info!("Stop requested; ending crawl after current batch");
                summary.stopped = true;
                break;
            }

            let draw = match self.max_count {
                Some(max) => {
                    let remaining = max.saturating_sub(summary.attempted);
                    if remaining == 0 {
                        tracing::info!("Reached attempt cap of {}", max);
                        break;
                    }
                    batch_size.min(remaining as usize)
                }
                None => batch_size,
            };

            let now = Utc::now();
            let batch = {
                let mut storage = lock_storage(&self.storage);
                let reclaimed = storage.reconcile_stale_in_flight(self.kind, grace, now)?;
                if reclaimed > 0 {
                    tracing::info!("Reclaimed {} stale in-flight targets", reclaimed);
                }
                self.space.next_batch(&mut *storage, draw, max_attempts, now)?
            };

            if batch.is_empty() {
                consecutive_empty += 1;
                // An empty draw from an ID range means the range is done;
                // for URL checks one more draw distinguishes "nothing due
                // yet" from "nothing left".
                if self.kind == TargetKind::Recipe || consecutive_empty >= 2 {
                    tracing::info!("No eligible targets remain");
                    break;
                }
                sleep(std::time::Duration::from_millis(
                    self.config.crawler.batch_pause_ms,
                ))
                .await;
                continue;
            }
            consecutive_empty = 0;

            tracing::debug!("Dispatching batch of {} targets", batch.len());
            summary.attempted += batch.len() as u64;

            let mut handles = Vec::with_capacity(batch.len());
            for target in batch {
                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    // The semaphore is never closed
                    Err(_) => break,
                };

                let pipeline = Arc::clone(&self.pipeline);
                let storage = Arc::clone(&self.storage);
                let kind = self.kind;

                handles.push(tokio::spawn(async move {
                    let _permit = permit;

                    let outcome = pipeline.process(&target).await;
                    let update = decide(&outcome, target.retry_count, max_attempts, Utc::now());

                    tracing::debug!(
                        "Target {} {}: {} -> {}",
                        kind,
                        target.target_id,
                        outcome.label(),
                        update.status,
                    );

                    let applied = lock_storage(&storage).apply_update(
                        kind,
                        target.target_id,
                        &update,
                        Utc::now(),
                    );
                    if let Err(e) = applied {
                        tracing::error!(
                            "Failed to record outcome for {} {}: {}",
                            kind,
                            target.target_id,
                            e
                        );
                    }

                    update.status
                }));
            }

            for handle in handles {
                match handle.await {
                    Ok(TargetStatus::Succeeded) => summary.succeeded += 1,
                    Ok(TargetStatus::RetryPending) => summary.retried += 1,
                    Ok(TargetStatus::PermanentlyFailed) => summary.permanently_failed += 1,
                    Ok(TargetStatus::Pending) => summary.deferred += 1,
                    Ok(TargetStatus::InFlight) => {}
                    Err(e) => tracing::error!("Worker task failed: {}", e),
                }
            }

            sleep(std::time::Duration::from_millis(
                self.config.crawler.batch_pause_ms,
            ))
            .await;
        }

        tracing::info!(
            "Crawl finished: {} attempted, {} succeeded, {} retried, {} permanently failed, {} deferred",
            summary.attempted,
            summary.succeeded,
            summary.retried,
            summary.permanently_failed,
            summary.deferred,
        );

        Ok(summary)
    }
}

/// Locks the shared store, recovering from a poisoned mutex
fn lock_storage(storage: &Arc<Mutex<SqliteStorage>>) -> MutexGuard<'_, SqliteStorage> {
    match storage.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

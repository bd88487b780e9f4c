//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::model::RecipeResponse;
use crate::state::{TargetKind, TargetStatus};
use crate::storage::{PersistOutcome, RunRecord, RunStatus, TargetRecord};
use crate::retry::StatusUpdate;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Target not found: {kind} {target_id}")]
    TargetNotFound { kind: TargetKind, target_id: i64 },

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the crawl engine.
/// A backend is not expected to be internally thread-safe; concurrent
/// workers must share it behind a mutex or use one instance per worker.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run of the given kind
    ///
    /// # Arguments
    ///
    /// * `kind` - The crawl kind this run processes
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, kind: TargetKind, config_hash: &str) -> StorageResult<i64>;

    /// Gets the most recent run of the given kind
    fn get_latest_run(&self, kind: TargetKind) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;

    // ===== Target Bookkeeping =====

    /// Inserts status rows for targets that don't have one yet
    ///
    /// Existing rows are left untouched, making the call idempotent under
    /// concurrent re-runs.
    ///
    /// # Arguments
    ///
    /// * `kind` - The crawl kind
    /// * `targets` - Pairs of target ID and optional payload (URL string)
    ///
    /// # Returns
    ///
    /// The number of rows actually inserted
    fn insert_pending_targets(
        &mut self,
        kind: TargetKind,
        targets: &[(i64, Option<String>)],
    ) -> StorageResult<usize>;

    /// Gets a single target's status row
    fn get_target(&self, kind: TargetKind, target_id: i64) -> StorageResult<Option<TargetRecord>>;

    /// Gets all status rows with target IDs in `[low, high]`
    fn get_targets_in_range(
        &self,
        kind: TargetKind,
        low: i64,
        high: i64,
    ) -> StorageResult<Vec<TargetRecord>>;

    /// Marks the given targets as in-flight with a claim timestamp
    fn claim_targets(
        &mut self,
        kind: TargetKind,
        target_ids: &[i64],
        now: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Applies a scheduler decision to a target's status row
    ///
    /// The update is a single atomic read-modify-write of the status and
    /// retry columns, so concurrent workers never race on the same row.
    fn apply_update(
        &mut self,
        kind: TargetKind,
        target_id: i64,
        update: &StatusUpdate,
        now: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Returns stale in-flight rows to pending
    ///
    /// A row claimed longer ago than `grace` with no terminal update belongs
    /// to a worker that died; treating it as pending again is what makes the
    /// crawl resumable after a crash.
    ///
    /// # Returns
    ///
    /// The number of rows reset
    fn reconcile_stale_in_flight(
        &mut self,
        kind: TargetKind,
        grace: Duration,
        now: DateTime<Utc>,
    ) -> StorageResult<usize>;

    /// Resets failed targets to pending with a cleared retry counter
    ///
    /// Covers both `retry_pending` and `permanently_failed` rows, optionally
    /// limited to an ID range. Used by the force-retry flag for deliberate
    /// full re-crawls.
    fn reset_failed_targets(
        &mut self,
        kind: TargetKind,
        start_id: Option<i64>,
        end_id: Option<i64>,
    ) -> StorageResult<usize>;

    /// Highest target ID with a status row of the given kind
    fn max_target_id(&self, kind: TargetKind) -> StorageResult<Option<i64>>;

    /// Lowest target ID of the given kind still awaiting a terminal status
    ///
    /// Covers pending, in-flight and retry-pending rows. A crawl resuming
    /// with default parameters starts here so that targets stranded below
    /// the high-water mark by a crash are re-attempted rather than
    /// skipped forever.
    fn min_unsettled_target_id(&self, kind: TargetKind) -> StorageResult<Option<i64>>;

    // ===== URL Check Selection =====

    /// Creates missing source-URL status rows from persisted recipes
    ///
    /// Every recipe with a source URL but no status row yet gets one,
    /// optionally limited to an ID range. Idempotent.
    ///
    /// # Returns
    ///
    /// The number of rows inserted
    fn backfill_url_targets(
        &mut self,
        start_id: Option<i64>,
        end_id: Option<i64>,
    ) -> StorageResult<usize>;

    /// Selects the next batch of URL targets to check
    ///
    /// Eligible rows are pending or due retry-pending ones below the retry
    /// ceiling; `check_all` widens the selection to already-succeeded rows
    /// so accessible URLs are revalidated too. Never-tried targets sort
    /// before retries, then oldest last-checked first.
    fn select_url_batch(
        &self,
        start_id: Option<i64>,
        end_id: Option<i64>,
        check_all: bool,
        max_attempts: u32,
        limit: usize,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<TargetRecord>>;

    // ===== Derived Entity Persistence =====

    /// Persists a raw response and its derived recipe in one transaction
    ///
    /// Either both the audit row and the recipe (with its ingredient,
    /// cuisine and dish-type associations) commit, or neither does. A
    /// primary-key conflict on the recipe means a concurrent run already
    /// processed this target and is reported as [`PersistOutcome::Conflict`]
    /// with nothing written.
    fn persist_recipe(
        &mut self,
        target_id: i64,
        raw_json: &str,
        recipe: &RecipeResponse,
        now: DateTime<Utc>,
    ) -> StorageResult<PersistOutcome>;

    /// Records a completed image download for a recipe
    fn mark_image_downloaded(&mut self, recipe_id: i64, file_ext: &str) -> StorageResult<()>;

    // ===== Statistics =====

    /// Counts status rows of a kind in a given status
    fn count_targets_by_status(
        &self,
        kind: TargetKind,
        status: TargetStatus,
    ) -> StorageResult<u64>;

    /// Counts all status rows of a kind
    fn count_targets(&self, kind: TargetKind) -> StorageResult<u64>;

    /// Counts raw-response audit rows
    fn count_raw_responses(&self) -> StorageResult<u64>;

    /// Counts persisted recipes
    fn count_recipes(&self) -> StorageResult<u64>;
}

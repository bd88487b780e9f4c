//! Target space enumeration and batch claiming
//!
//! A [`TargetSpace`] answers one question for the dispatcher: which targets
//! should the next batch attempt? Eligibility is re-derived from the store on
//! every draw rather than cached for the run, so a crawl interrupted and
//! restarted produces the same work as one that ran straight through.

use crate::state::TargetKind;
use crate::storage::{Storage, StorageResult, TargetRecord};
use chrono::{DateTime, Utc};

/// The set of targets a crawl run enumerates
#[derive(Debug)]
pub enum TargetSpace {
    /// Dense recipe-ID range starting at `cursor`, optionally bounded
    IdRange { cursor: i64, end: Option<i64> },

    /// Source-URL rows selected by the store's due-order query
    UrlChecks {
        start: Option<i64>,
        end: Option<i64>,
        check_all: bool,
        backfilled: bool,
    },
}

impl TargetSpace {
    /// Creates an ID-range space over `[start, end]` (unbounded when `end`
    /// is None)
    pub fn id_range(start: i64, end: Option<i64>) -> Self {
        Self::IdRange { cursor: start, end }
    }

    /// Creates a URL-check space, optionally limited to a recipe-ID range
    pub fn url_checks(start: Option<i64>, end: Option<i64>, check_all: bool) -> Self {
        Self::UrlChecks {
            start,
            end,
            check_all,
            backfilled: false,
        }
    }

    /// The crawl kind this space enumerates
    pub fn kind(&self) -> TargetKind {
        match self {
            Self::IdRange { .. } => TargetKind::Recipe,
            Self::UrlChecks { .. } => TargetKind::SourceUrl,
        }
    }

    /// Draws and claims the next batch of eligible targets
    ///
    /// Returned rows are already marked in-flight, so a concurrent or
    /// crashed-and-resumed run cannot claim them again within the grace
    /// window. An empty batch from an ID-range space means the range is
    /// exhausted; from a URL-check space it means nothing is due right now.
    pub fn next_batch(
        &mut self,
        storage: &mut dyn Storage,
        batch_size: usize,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<TargetRecord>> {
        match self {
            Self::IdRange { cursor, end } => {
                next_id_batch(storage, cursor, *end, batch_size, max_attempts, now)
            }
            Self::UrlChecks {
                start,
                end,
                check_all,
                backfilled,
            } => {
                if !*backfilled {
                    let inserted = storage.backfill_url_targets(*start, *end)?;
                    if inserted > 0 {
                        tracing::info!("Backfilled {} source-URL status rows", inserted);
                    }
                    *backfilled = true;
                }

                let batch = storage.select_url_batch(
                    *start,
                    *end,
                    *check_all,
                    max_attempts,
                    batch_size,
                    now,
                )?;
                claim(storage, TargetKind::SourceUrl, &batch, now)?;
                Ok(batch)
            }
        }
    }
}

/// Draws the next batch from a dense ID range
///
/// Scans forward one window at a time: IDs with no status row yet are
/// inserted as pending, then every eligible row in the window is claimed.
/// Windows where every target already reached a terminal status are skipped
/// rather than returned as an empty batch.
fn next_id_batch(
    storage: &mut dyn Storage,
    cursor: &mut i64,
    end: Option<i64>,
    batch_size: usize,
    max_attempts: u32,
    now: DateTime<Utc>,
) -> StorageResult<Vec<TargetRecord>> {
    loop {
        if let Some(end) = end {
            if *cursor > end {
                return Ok(Vec::new());
            }
        }

        let window_high = match end {
            Some(end) => (*cursor + batch_size as i64 - 1).min(end),
            None => *cursor + batch_size as i64 - 1,
        };
        let window_low = *cursor;
        *cursor = window_high + 1;

        let existing = storage.get_targets_in_range(TargetKind::Recipe, window_low, window_high)?;

        let missing: Vec<(i64, Option<String>)> = (window_low..=window_high)
            .filter(|id| !existing.iter().any(|r| r.target_id == *id))
            .map(|id| (id, None))
            .collect();
        if !missing.is_empty() {
            storage.insert_pending_targets(TargetKind::Recipe, &missing)?;
        }

        let batch: Vec<TargetRecord> = storage
            .get_targets_in_range(TargetKind::Recipe, window_low, window_high)?
            .into_iter()
            .filter(|r| r.is_eligible(now) && r.retry_count < max_attempts)
            .collect();

        if !batch.is_empty() {
            claim(storage, TargetKind::Recipe, &batch, now)?;
            return Ok(batch);
        }
        // Whole window already settled; move on to the next one
    }
}

fn claim(
    storage: &mut dyn Storage,
    kind: TargetKind,
    batch: &[TargetRecord],
    now: DateTime<Utc>,
) -> StorageResult<()> {
    if batch.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = batch.iter().map(|r| r.target_id).collect();
    storage.claim_targets(kind, &ids, now)
}

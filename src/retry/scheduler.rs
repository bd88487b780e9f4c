//! Attempt outcome classification and the per-target status state machine
//!
//! Every fetch produces exactly one [`AttemptOutcome`], which [`decide`] folds
//! into a [`StatusUpdate`] applied to the status table. The fold is a pure
//! function of the outcome, the current retry count and the clock, so the
//! whole retry policy can be unit tested without any I/O.

use crate::retry::backoff;
use crate::state::TargetStatus;
use chrono::{DateTime, Utc};

/// The classified result of one fetch attempt
///
/// Never persisted as-is; always folded into a target status update.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// Fetched, parsed and persisted successfully
    Success { http_status: u16 },

    /// Target confirmed absent upstream (HTTP 404), or for URL checks a
    /// response outside the accessible range
    Absent { http_status: Option<u16> },

    /// Timeout, connection error or 5xx-class response
    Transient {
        http_status: Option<u16>,
        error: String,
    },

    /// Response received but its shape was not the expected schema
    Malformed { error: String },

    /// A concurrent run already persisted this target's derived entity
    StoreConflict,

    /// The store itself failed; says nothing about the remote resource
    StoreFailure { error: String },
}

impl AttemptOutcome {
    /// Returns a short classification label for logging
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Absent { .. } => "absent",
            Self::Transient { .. } => "transient",
            Self::Malformed { .. } => "malformed",
            Self::StoreConflict => "store_conflict",
            Self::StoreFailure { .. } => "store_failure",
        }
    }
}

/// The status-table update produced by folding one attempt outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// The status the target transitions to
    pub status: TargetStatus,

    /// How much to add to the persisted retry count (0 or 1)
    pub retry_increment: u32,

    /// When the target becomes eligible again, if it does
    pub next_eligible: Option<DateTime<Utc>>,

    /// HTTP status observed on this attempt, if any
    pub http_status: Option<u16>,

    /// Error text for offline inspection, if the attempt failed
    pub error_text: Option<String>,
}

/// Folds an attempt outcome into a status update
///
/// State machine per target:
/// `pending -> in_flight -> {succeeded | retry_pending -> in_flight -> ... | permanently_failed}`
///
/// - Success and store-conflict both land in `succeeded` with `next_eligible`
///   cleared; a conflict only proves a concurrent run got there first.
/// - Confirmed-absent short-circuits to `permanently_failed` without touching
///   the retry count.
/// - Transient and malformed outcomes increment the retry count; once it
///   reaches `max_attempts` the target is `permanently_failed`, otherwise it
///   waits out `backoff(retry_count)`.
/// - A store failure puts the target back to `pending` untouched: it is not
///   evidence about the remote resource and must stay eligible next run.
///
/// # Arguments
///
/// * `outcome` - The classified result of the attempt
/// * `retry_count` - The target's persisted retry count before this attempt
/// * `max_attempts` - The retry ceiling (3 in the validated design)
/// * `now` - The current time, injected for testability
pub fn decide(
    outcome: &AttemptOutcome,
    retry_count: u32,
    max_attempts: u32,
    now: DateTime<Utc>,
) -> StatusUpdate {
    match outcome {
        AttemptOutcome::Success { http_status } => StatusUpdate {
            status: TargetStatus::Succeeded,
            retry_increment: 0,
            next_eligible: None,
            http_status: Some(*http_status),
            error_text: None,
        },

        AttemptOutcome::StoreConflict => StatusUpdate {
            status: TargetStatus::Succeeded,
            retry_increment: 0,
            next_eligible: None,
            http_status: None,
            error_text: None,
        },

        AttemptOutcome::Absent { http_status } => StatusUpdate {
            status: TargetStatus::PermanentlyFailed,
            retry_increment: 0,
            next_eligible: None,
            http_status: *http_status,
            error_text: Some("confirmed absent upstream".to_string()),
        },

        AttemptOutcome::Transient { http_status, error } => {
            retry_update(retry_count, max_attempts, now, *http_status, error)
        }

        AttemptOutcome::Malformed { error } => {
            retry_update(retry_count, max_attempts, now, None, error)
        }

        AttemptOutcome::StoreFailure { error } => StatusUpdate {
            status: TargetStatus::Pending,
            retry_increment: 0,
            next_eligible: None,
            http_status: None,
            error_text: Some(error.clone()),
        },
    }
}

/// Shared transition for outcomes that consume retry budget
fn retry_update(
    retry_count: u32,
    max_attempts: u32,
    now: DateTime<Utc>,
    http_status: Option<u16>,
    error: &str,
) -> StatusUpdate {
    let new_count = retry_count + 1;

    if new_count >= max_attempts {
        StatusUpdate {
            status: TargetStatus::PermanentlyFailed,
            retry_increment: 1,
            next_eligible: None,
            http_status,
            error_text: Some(error.to_string()),
        }
    } else {
        StatusUpdate {
            status: TargetStatus::RetryPending,
            retry_increment: 1,
            next_eligible: Some(now + backoff(new_count)),
            http_status,
            error_text: Some(error.to_string()),
        }
    }
}

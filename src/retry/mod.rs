//! Retry scheduling and backoff policy
//!
//! This module decides, after each attempt, whether and when a target becomes
//! eligible again. The decision logic is pure and separated from all I/O so
//! it can be tested in isolation.

mod backoff;
mod scheduler;

pub use backoff::{backoff, BACKOFF_HOURS};
pub use scheduler::{decide, AttemptOutcome, StatusUpdate};

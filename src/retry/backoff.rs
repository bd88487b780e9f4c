//! Backoff schedule for transiently failed targets
//!
//! The delay before a failed target becomes eligible again follows a fixed
//! escalating table rather than growing unbounded.

use chrono::Duration;

/// Escalating backoff delays in hours: 1h, 4h, 12h, 1d, 3d, 1w
pub const BACKOFF_HOURS: [i64; 6] = [1, 4, 12, 24, 72, 168];

/// Computes the backoff delay for a given retry count
///
/// The table is indexed by `retry_count - 1` and saturates at its last entry,
/// so the seventh and every later retry wait one week. A retry count of zero
/// is treated the same as the first retry.
///
/// # Arguments
///
/// * `retry_count` - The number of failed attempts so far (1-based)
///
/// # Returns
///
/// The duration until the target is eligible again
pub fn backoff(retry_count: u32) -> Duration {
    let index = (retry_count.saturating_sub(1) as usize).min(BACKOFF_HOURS.len() - 1);
    Duration::hours(BACKOFF_HOURS[index])
}

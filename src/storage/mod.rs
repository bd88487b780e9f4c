//! Storage module for persisting crawl state and derived entities
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Per-target status bookkeeping and retry scheduling columns
//! - Raw-response audit rows and derived recipe persistence
//! - Run tracking and resumption support

mod schema;
mod sqlite;
mod traits;

pub use schema::initialize_schema;
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::{TargetKind, TargetStatus};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// A row in the per-target status table
#[derive(Debug, Clone)]
pub struct TargetRecord {
    pub kind: TargetKind,
    pub target_id: i64,
    pub payload: Option<String>,
    pub status: TargetStatus,
    pub http_status: Option<u16>,
    pub error_text: Option<String>,
    pub retry_count: u32,
    pub last_checked: Option<DateTime<Utc>>,
    pub next_eligible: Option<DateTime<Utc>>,
}

impl TargetRecord {
    /// Returns true if the target is eligible for an attempt at `now`
    ///
    /// Terminal and in-flight rows are never eligible; retry-pending rows
    /// only once their next-eligible time has passed.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            TargetStatus::Pending => true,
            TargetStatus::RetryPending => self
                .next_eligible
                .map(|eligible| now >= eligible)
                .unwrap_or(true),
            _ => false,
        }
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub kind: TargetKind,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Result of a transactional derived-entity write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Raw response and derived entity committed
    Inserted,

    /// A concurrent run already persisted this target; nothing was written
    Conflict,
}

//! Recipe-Harvest: a resumable recipe ingestion crawler
//!
//! This crate implements a bounded-concurrency crawler that harvests recipe
//! records from a rate-limited remote API and revalidates recipe source URLs,
//! tracking every target through a persisted retry lifecycle so that crawls
//! can be interrupted and resumed at any point.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod retry;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Recipe-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Recipe-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use retry::{backoff, AttemptOutcome};
pub use state::{TargetKind, TargetStatus};

use serde::Deserialize;

/// Main configuration structure for Recipe-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub output: OutputConfig,
}

/// Remote recipe API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the recipe API
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// API key appended to every recipe request
    #[serde(rename = "api-key")]
    pub api_key: String,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of pipeline invocations in flight at once
    #[serde(rename = "max-workers")]
    pub max_workers: u32,

    /// Number of targets drawn per batch
    #[serde(rename = "batch-size")]
    pub batch_size: u32,

    /// Pause between batches in milliseconds (the global rate-limit budget)
    #[serde(rename = "batch-pause-ms", default = "default_batch_pause")]
    pub batch_pause_ms: u64,

    /// Minutes before a claimed in-flight target is treated as abandoned
    #[serde(rename = "claim-grace-minutes", default = "default_claim_grace")]
    pub claim_grace_minutes: i64,

    /// User-agent string sent on URL liveness checks
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Retry policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts before a target is permanently failed
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory where downloaded recipe images are stored
    #[serde(rename = "image-dir", default = "default_image_dir")]
    pub image_dir: String,
}

fn default_request_timeout() -> u64 {
    10
}

fn default_batch_pause() -> u64 {
    1000
}

fn default_claim_grace() -> i64 {
    30
}

fn default_user_agent() -> String {
    "RecipeHarvest/1.0".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_image_dir() -> String {
    "./recipe_images".to_string()
}

//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawl engine, including:
//! - Building HTTP clients with a fixed user agent and per-request timeout
//! - GET requests against the remote recipe API with response classification
//! - HEAD requests for source-URL liveness checks
//! - The secondary image-download fetch

use crate::model::RecipeResponse;
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Classified result of one recipe API fetch
#[derive(Debug)]
pub enum RecipeFetch {
    /// 200 with a body that deserialized into the domain schema
    Success {
        http_status: u16,
        /// Verbatim response body, persisted for audit/replay
        raw_json: String,
        recipe: RecipeResponse,
    },

    /// 404: the recipe is confirmed absent upstream
    NotFound,

    /// Any other HTTP status (transient)
    HttpError { http_status: u16 },

    /// Timeout or connection-level failure (transient)
    NetworkError { error: String },

    /// 200 but the body did not match the expected schema
    Malformed { error: String },
}

/// Result of one source-URL liveness check
#[derive(Debug)]
pub struct UrlCheck {
    /// HTTP status of the final response, if one was received
    pub http_status: Option<u16>,

    /// True iff the status is in `[200, 400)`
    pub accessible: bool,

    /// Transport error description when no response was received
    pub error: Option<String>,
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are followed (the liveness check counts a redirect target's
/// status) and every request is bounded by the configured timeout.
///
/// # Arguments
///
/// * `user_agent` - The user agent string to send
/// * `timeout_secs` - Per-request timeout in seconds
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(user_agent: &str, timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.to_string())
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches one recipe from the remote API and classifies the result
///
/// Request shape: `GET {base}/recipes/{id}/information?includeNutrition=false&apiKey={key}`.
///
/// | Condition | Classification |
/// |-----------|----------------|
/// | 200, body matches schema | Success |
/// | 200, body doesn't match | Malformed |
/// | 404 | NotFound (confirmed absent) |
/// | Other status | HttpError (transient) |
/// | Timeout / connection error | NetworkError (transient) |
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `base_url` - Base URL of the recipe API
/// * `api_key` - API key appended to the request
/// * `recipe_id` - The recipe identifier to fetch
pub async fn fetch_recipe(
    client: &Client,
    base_url: &str,
    api_key: &str,
    recipe_id: i64,
) -> RecipeFetch {
    let url = format!(
        "{}/recipes/{}/information?includeNutrition=false&apiKey={}",
        base_url.trim_end_matches('/'),
        recipe_id,
        api_key
    );

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            let error = if e.is_timeout() {
                "Request timeout".to_string()
            } else if e.is_connect() {
                format!("Connection error: {}", e)
            } else {
                e.to_string()
            };
            return RecipeFetch::NetworkError { error };
        }
    };

    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return RecipeFetch::NotFound;
    }

    if !status.is_success() {
        return RecipeFetch::HttpError {
            http_status: status.as_u16(),
        };
    }

    let raw_json = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            return RecipeFetch::NetworkError {
                error: format!("Failed to read body: {}", e),
            }
        }
    };

    match serde_json::from_str::<RecipeResponse>(&raw_json) {
        Ok(recipe) => RecipeFetch::Success {
            http_status: status.as_u16(),
            raw_json,
            recipe,
        },
        Err(e) => RecipeFetch::Malformed {
            error: e.to_string(),
        },
    }
}

/// Checks a source URL for liveness with a HEAD request
///
/// Redirects are followed by the client; the URL counts as accessible iff
/// the final status is in `[200, 400)`.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to check
pub async fn check_url(client: &Client, url: &str) -> UrlCheck {
    match client.head(url).send().await {
        Ok(response) => {
            let code = response.status().as_u16();
            UrlCheck {
                http_status: Some(code),
                accessible: (200..400).contains(&code),
                error: None,
            }
        }
        Err(e) => {
            let error = if e.is_timeout() {
                "Request timeout".to_string()
            } else {
                e.to_string()
            };
            UrlCheck {
                http_status: None,
                accessible: false,
                error: Some(error),
            }
        }
    }
}

/// Extracts the lowercased file extension from an image URL's path
///
/// Returns None when the URL doesn't parse or its path has no extension,
/// in which case the image is skipped.
pub fn image_file_extension(image_url: &str) -> Option<String> {
    let parsed = Url::parse(image_url).ok()?;
    let ext = Path::new(parsed.path())
        .extension()?
        .to_str()?
        .to_lowercase();
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

/// Downloads a recipe image to `{image_dir}/{recipe_id}.{ext}`
///
/// This is an independently failable side effect: an error here never rolls
/// back the already-committed recipe.
///
/// # Returns
///
/// * `Ok(file_ext)` - Image saved; returns the extension used
/// * `Err(message)` - Download or write failed
pub async fn download_image(
    client: &Client,
    image_url: &str,
    image_dir: &Path,
    recipe_id: i64,
) -> Result<String, String> {
    let file_ext = image_file_extension(image_url)
        .ok_or_else(|| format!("No file extension in image URL {}", image_url))?;

    let response = client
        .get(image_url)
        .send()
        .await
        .map_err(|e| format!("Image request failed: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("Image request returned HTTP {}", response.status()));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| format!("Failed to read image body: {}", e))?;

    let filepath: PathBuf = image_dir.join(format!("{}.{}", recipe_id, file_ext));
    tokio::fs::write(&filepath, &bytes)
        .await
        .map_err(|e| format!("Failed to write {}: {}", filepath.display(), e))?;

    Ok(file_ext)
}

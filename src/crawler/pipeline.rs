//! The per-target fetch-parse-persist pipeline
//!
//! One pipeline invocation turns a claimed target into exactly one
//! [`AttemptOutcome`]. Fetch errors, malformed bodies and store failures are
//! all classified here rather than propagated, so the batch loop never sees
//! a per-target error.

use crate::config::Config;
use crate::crawler::fetcher::{self, RecipeFetch};
use crate::retry::AttemptOutcome;
use crate::state::TargetKind;
use crate::storage::{PersistOutcome, SqliteStorage, Storage, TargetRecord};
use chrono::Utc;
use reqwest::Client;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Processes claimed targets into attempt outcomes
pub struct Pipeline {
    client: Client,
    storage: Arc<Mutex<SqliteStorage>>,
    config: Arc<Config>,
}

impl Pipeline {
    pub fn new(client: Client, storage: Arc<Mutex<SqliteStorage>>, config: Arc<Config>) -> Self {
        Self {
            client,
            storage,
            config,
        }
    }

    /// Runs one target through the pipeline
    ///
    /// Dispatches on the target's kind; always returns an outcome.
    pub async fn process(&self, target: &TargetRecord) -> AttemptOutcome {
        match target.kind {
            TargetKind::Recipe => self.process_recipe(target.target_id).await,
            TargetKind::SourceUrl => self.process_url(target).await,
        }
    }

    /// Fetches a recipe, persists it, and downloads its image
    ///
    /// The image download runs after the recipe transaction commits and its
    /// failure only logs; the attempt outcome is decided by the fetch and
    /// the persist alone.
    async fn process_recipe(&self, target_id: i64) -> AttemptOutcome {
        let fetch = fetcher::fetch_recipe(
            &self.client,
            &self.config.api.base_url,
            &self.config.api.api_key,
            target_id,
        )
        .await;

        let (http_status, raw_json, recipe) = match fetch {
            RecipeFetch::Success {
                http_status,
                raw_json,
                recipe,
            } => (http_status, raw_json, recipe),
            RecipeFetch::NotFound => {
                return AttemptOutcome::Absent {
                    http_status: Some(404),
                }
            }
            RecipeFetch::HttpError { http_status } => {
                return AttemptOutcome::Transient {
                    http_status: Some(http_status),
                    error: format!("HTTP {}", http_status),
                }
            }
            RecipeFetch::NetworkError { error } => {
                return AttemptOutcome::Transient {
                    http_status: None,
                    error,
                }
            }
            RecipeFetch::Malformed { error } => {
                tracing::warn!("Recipe {} returned a malformed body: {}", target_id, error);
                return AttemptOutcome::Malformed { error };
            }
        };

        // A body carrying someone else's id must not settle this target
        if recipe.id != target_id {
            let error = format!(
                "response id {} does not match requested recipe {}",
                recipe.id, target_id
            );
            tracing::warn!("Recipe {} returned a malformed body: {}", target_id, error);
            return AttemptOutcome::Malformed { error };
        }

        let persisted = self
            .lock_storage()
            .persist_recipe(target_id, &raw_json, &recipe, Utc::now());

        match persisted {
            Ok(PersistOutcome::Inserted) => {
                if let Some(image_url) = &recipe.image {
                    self.download_recipe_image(target_id, image_url).await;
                }
                AttemptOutcome::Success { http_status }
            }
            Ok(PersistOutcome::Conflict) => {
                tracing::debug!("Recipe {} already persisted by another run", target_id);
                AttemptOutcome::StoreConflict
            }
            Err(e) => AttemptOutcome::StoreFailure {
                error: e.to_string(),
            },
        }
    }

    /// Checks a source URL for liveness
    ///
    /// Accessible means the final status is in `[200, 400)`. Anything else,
    /// including a 404, is a transient outcome: dead links get the full
    /// backoff ladder before being written off.
    async fn process_url(&self, target: &TargetRecord) -> AttemptOutcome {
        let url = match &target.payload {
            Some(url) => url,
            None => {
                return AttemptOutcome::Malformed {
                    error: "target has no URL payload".to_string(),
                }
            }
        };

        let check = fetcher::check_url(&self.client, url).await;

        if check.accessible {
            AttemptOutcome::Success {
                // Accessible implies a status was received
                http_status: check.http_status.unwrap_or(200),
            }
        } else {
            let error = match (check.http_status, check.error) {
                (Some(code), _) => format!("HTTP {}", code),
                (None, Some(error)) => error,
                (None, None) => "request failed".to_string(),
            };
            AttemptOutcome::Transient {
                http_status: check.http_status,
                error,
            }
        }
    }

    /// Best-effort image download; never affects the attempt outcome
    async fn download_recipe_image(&self, recipe_id: i64, image_url: &str) {
        let image_dir = Path::new(&self.config.output.image_dir);
        match fetcher::download_image(&self.client, image_url, image_dir, recipe_id).await {
            Ok(file_ext) => {
                if let Err(e) = self
                    .lock_storage()
                    .mark_image_downloaded(recipe_id, &file_ext)
                {
                    tracing::warn!("Failed to record image for recipe {}: {}", recipe_id, e);
                }
            }
            Err(e) => {
                tracing::warn!("Image download for recipe {} failed: {}", recipe_id, e);
            }
        }
    }

    /// Locks the shared store, recovering from a poisoned mutex
    ///
    /// A worker panicking mid-batch must not wedge every other worker; the
    /// store's own transactions keep it consistent regardless.
    fn lock_storage(&self) -> MutexGuard<'_, SqliteStorage> {
        match self.storage.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

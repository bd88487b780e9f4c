//! Integration tests for the harvest and URL-check crawls
//!
//! These tests use wiremock to stand in for the remote recipe API and
//! exercise the full crawl cycle end-to-end against a real database file.

use recipe_harvest::config::{ApiConfig, Config, CrawlerConfig, OutputConfig, RetryConfig};
use recipe_harvest::crawler::{run_harvest, run_url_check, HarvestOptions, UrlCheckOptions};
use recipe_harvest::storage::{RunStatus, SqliteStorage, Storage};
use recipe_harvest::{TargetKind, TargetStatus};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointed at the mock server
fn create_test_config(base_url: &str, db_path: &str, image_dir: &str) -> Config {
    Config {
        api: ApiConfig {
            base_url: base_url.to_string(),
            api_key: "test-key".to_string(),
            request_timeout_secs: 5,
        },
        crawler: CrawlerConfig {
            max_workers: 4,
            batch_size: 3,
            batch_pause_ms: 10, // Very short for testing
            claim_grace_minutes: 30,
            user_agent: "RecipeHarvest/1.0".to_string(),
        },
        retry: RetryConfig { max_attempts: 3 },
        output: OutputConfig {
            database_path: db_path.to_string(),
            image_dir: image_dir.to_string(),
        },
    }
}

fn no_stop() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

/// Mounts a recipe endpoint returning a minimal valid body for one ID
async fn mount_recipe(server: &MockServer, id: i64) {
    Mock::given(method("GET"))
        .and(path(format!("/recipes/{}/information", id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"{{"id": {}, "title": "Recipe {}", "sourceUrl": "https://example.com/r/{}"}}"#,
            id, id, id
        )))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_harvest_over_bounded_range() {
    let server = MockServer::start().await;
    for id in 1..=5 {
        mount_recipe(&server, id).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");
    let image_dir = dir.path().join("images");
    let config = create_test_config(
        &server.uri(),
        db_path.to_str().unwrap(),
        image_dir.to_str().unwrap(),
    );

    let options = HarvestOptions {
        start_id: Some(1),
        end_id: Some(5),
        max_count: None,
        force_retry: false,
    };

    let summary = run_harvest(config, "test-hash", options, no_stop())
        .await
        .unwrap();

    assert_eq!(summary.attempted, 5);
    assert_eq!(summary.succeeded, 5);
    assert!(!summary.stopped);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_recipes().unwrap(), 5);
    assert_eq!(storage.count_raw_responses().unwrap(), 5);
    assert_eq!(
        storage
            .count_targets_by_status(TargetKind::Recipe, TargetStatus::Succeeded)
            .unwrap(),
        5
    );

    // The run is recorded as completed
    let run = storage.get_latest_run(TargetKind::Recipe).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let server = MockServer::start().await;
    for id in 1..=4 {
        mount_recipe(&server, id).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");
    let image_dir = dir.path().join("images");

    let options = HarvestOptions {
        start_id: Some(1),
        end_id: Some(4),
        max_count: None,
        force_retry: false,
    };

    let config = create_test_config(
        &server.uri(),
        db_path.to_str().unwrap(),
        image_dir.to_str().unwrap(),
    );
    let first = run_harvest(config.clone(), "h", options.clone(), no_stop())
        .await
        .unwrap();
    assert_eq!(first.attempted, 4);

    // Same range again: every target is already terminal
    let second = run_harvest(config, "h", options, no_stop()).await.unwrap();
    assert_eq!(second.attempted, 0);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_recipes().unwrap(), 4);
    assert_eq!(storage.count_raw_responses().unwrap(), 4);
}

#[tokio::test]
async fn test_missing_recipes_fail_permanently_without_retries() {
    let server = MockServer::start().await;
    mount_recipe(&server, 1).await;
    // ID 2 is absent upstream
    Mock::given(method("GET"))
        .and(path("/recipes/2/information"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");
    let config = create_test_config(
        &server.uri(),
        db_path.to_str().unwrap(),
        dir.path().join("images").to_str().unwrap(),
    );

    let options = HarvestOptions {
        start_id: Some(1),
        end_id: Some(2),
        max_count: None,
        force_retry: false,
    };
    let summary = run_harvest(config, "h", options, no_stop()).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.permanently_failed, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let absent = storage.get_target(TargetKind::Recipe, 2).unwrap().unwrap();
    assert_eq!(absent.status, TargetStatus::PermanentlyFailed);
    // Confirmed absence consumes no retry budget
    assert_eq!(absent.retry_count, 0);
    assert_eq!(absent.http_status, Some(404));
}

#[tokio::test]
async fn test_transient_failures_wait_out_their_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");
    let config = create_test_config(
        &server.uri(),
        db_path.to_str().unwrap(),
        dir.path().join("images").to_str().unwrap(),
    );

    let options = HarvestOptions {
        start_id: Some(1),
        end_id: Some(3),
        max_count: None,
        force_retry: false,
    };
    let summary = run_harvest(config.clone(), "h", options.clone(), no_stop())
        .await
        .unwrap();
    assert_eq!(summary.retried, 3);

    // Backoff hasn't elapsed, so an immediate re-run attempts nothing
    let summary = run_harvest(config, "h", options, no_stop()).await.unwrap();
    assert_eq!(summary.attempted, 0);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let target = storage.get_target(TargetKind::Recipe, 1).unwrap().unwrap();
    assert_eq!(target.status, TargetStatus::RetryPending);
    assert_eq!(target.retry_count, 1);
    assert!(target.next_eligible.is_some());
}

#[tokio::test]
async fn test_force_retry_makes_failed_targets_eligible_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/recipes/1/information"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_recipe(&server, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");
    let config = create_test_config(
        &server.uri(),
        db_path.to_str().unwrap(),
        dir.path().join("images").to_str().unwrap(),
    );

    let options = HarvestOptions {
        start_id: Some(1),
        end_id: Some(1),
        max_count: None,
        force_retry: false,
    };

    // First attempt hits the 503 and is rescheduled for later
    let summary = run_harvest(config.clone(), "h", options, no_stop())
        .await
        .unwrap();
    assert_eq!(summary.retried, 1);

    // Force-retry clears the schedule and the target succeeds immediately
    let options = HarvestOptions {
        start_id: Some(1),
        end_id: Some(1),
        max_count: None,
        force_retry: true,
    };
    let summary = run_harvest(config, "h", options, no_stop()).await.unwrap();
    assert_eq!(summary.succeeded, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_recipes().unwrap(), 1);
}

#[tokio::test]
async fn test_partial_batch_failure_keeps_completed_work() {
    let server = MockServer::start().await;
    mount_recipe(&server, 1).await;
    mount_recipe(&server, 3).await;
    Mock::given(method("GET"))
        .and(path("/recipes/2/information"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");
    let config = create_test_config(
        &server.uri(),
        db_path.to_str().unwrap(),
        dir.path().join("images").to_str().unwrap(),
    );

    let options = HarvestOptions {
        start_id: Some(1),
        end_id: Some(3),
        max_count: None,
        force_retry: false,
    };
    let summary = run_harvest(config, "h", options, no_stop()).await.unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.retried, 1);

    // The failed neighbor didn't take the successes down with it
    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_recipes().unwrap(), 2);
    assert_eq!(
        storage
            .get_target(TargetKind::Recipe, 2)
            .unwrap()
            .unwrap()
            .status,
        TargetStatus::RetryPending
    );
}

#[tokio::test]
async fn test_max_count_limits_open_ended_harvest() {
    let server = MockServer::start().await;
    for id in 1..=10 {
        mount_recipe(&server, id).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");
    let config = create_test_config(
        &server.uri(),
        db_path.to_str().unwrap(),
        dir.path().join("images").to_str().unwrap(),
    );

    let options = HarvestOptions {
        start_id: Some(1),
        end_id: None,
        max_count: Some(4),
        force_retry: false,
    };
    let summary = run_harvest(config.clone(), "h", options, no_stop())
        .await
        .unwrap();
    assert_eq!(summary.attempted, 4);

    // With no explicit start the next run resumes past the highest known ID
    let options = HarvestOptions {
        start_id: None,
        end_id: None,
        max_count: Some(4),
        force_retry: false,
    };
    let summary = run_harvest(config, "h", options, no_stop()).await.unwrap();
    assert_eq!(summary.attempted, 4);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_recipes().unwrap(), 8);
    assert_eq!(storage.max_target_id(TargetKind::Recipe).unwrap(), Some(8));
}

#[tokio::test]
async fn test_url_check_classifies_and_schedules() {
    let server = MockServer::start().await;
    for id in 1..=2 {
        Mock::given(method("GET"))
            .and(path(format!("/recipes/{}/information", id)))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"{{"id": {}, "title": "Recipe {}", "sourceUrl": "{}/pages/{}"}}"#,
                id,
                id,
                server.uri(),
                id
            )))
            .mount(&server)
            .await;
    }
    // Page 1 is alive, page 2 is gone
    Mock::given(method("HEAD"))
        .and(path("/pages/1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/pages/2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");
    let config = create_test_config(
        &server.uri(),
        db_path.to_str().unwrap(),
        dir.path().join("images").to_str().unwrap(),
    );

    let options = HarvestOptions {
        start_id: Some(1),
        end_id: Some(2),
        max_count: None,
        force_retry: false,
    };
    run_harvest(config.clone(), "h", options, no_stop())
        .await
        .unwrap();

    let options = UrlCheckOptions {
        start_id: None,
        end_id: None,
        check_all: false,
        force_retry: false,
    };
    let summary = run_url_check(config, "h", options, no_stop()).await.unwrap();

    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.retried, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let alive = storage.get_target(TargetKind::SourceUrl, 1).unwrap().unwrap();
    assert_eq!(alive.status, TargetStatus::Succeeded);
    assert_eq!(alive.http_status, Some(200));

    // Dead links get the backoff ladder rather than an immediate write-off
    let dead = storage.get_target(TargetKind::SourceUrl, 2).unwrap().unwrap();
    assert_eq!(dead.status, TargetStatus::RetryPending);
    assert_eq!(dead.http_status, Some(404));
    assert_eq!(dead.retry_count, 1);

    let run = storage
        .get_latest_run(TargetKind::SourceUrl)
        .unwrap()
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_check_all_revalidates_succeeded_urls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/recipes/1/information"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"{{"id": 1, "title": "Recipe 1", "sourceUrl": "{}/pages/1"}}"#,
            server.uri()
        )))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/pages/1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");
    let config = create_test_config(
        &server.uri(),
        db_path.to_str().unwrap(),
        dir.path().join("images").to_str().unwrap(),
    );

    let options = HarvestOptions {
        start_id: Some(1),
        end_id: Some(1),
        max_count: None,
        force_retry: false,
    };
    run_harvest(config.clone(), "h", options, no_stop())
        .await
        .unwrap();

    let options = UrlCheckOptions {
        start_id: None,
        end_id: None,
        check_all: false,
        force_retry: false,
    };
    let first = run_url_check(config.clone(), "h", options.clone(), no_stop())
        .await
        .unwrap();
    assert_eq!(first.attempted, 1);

    // Succeeded URLs are skipped by default
    let second = run_url_check(config.clone(), "h", options, no_stop())
        .await
        .unwrap();
    assert_eq!(second.attempted, 0);

    // check_all revisits them
    let options = UrlCheckOptions {
        start_id: None,
        end_id: None,
        check_all: true,
        force_retry: false,
    };
    let third = run_url_check(config, "h", options, no_stop()).await.unwrap();
    assert_eq!(third.attempted, 1);
    assert_eq!(third.succeeded, 1);
}

#[tokio::test]
async fn test_auto_start_revisits_targets_stranded_below_the_high_water_mark() {
    let server = MockServer::start().await;
    for id in 1..=8 {
        mount_recipe(&server, id).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");
    let config = create_test_config(
        &server.uri(),
        db_path.to_str().unwrap(),
        dir.path().join("images").to_str().unwrap(),
    );

    // Simulate a crashed run: target 1 was claimed an hour ago and never
    // finished, while targets 2-5 above it already settled
    {
        use recipe_harvest::retry::{decide, AttemptOutcome};

        let mut storage = SqliteStorage::new(&db_path).unwrap();
        let now = chrono::Utc::now();
        let targets: Vec<(i64, Option<String>)> = (1..=5).map(|id| (id, None)).collect();
        storage
            .insert_pending_targets(TargetKind::Recipe, &targets)
            .unwrap();
        storage
            .claim_targets(TargetKind::Recipe, &[1], now - chrono::Duration::hours(1))
            .unwrap();
        let success = decide(&AttemptOutcome::Success { http_status: 200 }, 0, 3, now);
        for id in 2..=5 {
            storage
                .apply_update(TargetKind::Recipe, id, &success, now)
                .unwrap();
        }
    }

    // Default parameters: no explicit start ID
    let options = HarvestOptions {
        start_id: None,
        end_id: None,
        max_count: Some(3),
        force_retry: false,
    };
    let summary = run_harvest(config, "h", options, no_stop()).await.unwrap();
    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.succeeded, 3);

    // The stranded target was re-attempted, not skipped forever
    let storage = SqliteStorage::new(&db_path).unwrap();
    let stranded = storage.get_target(TargetKind::Recipe, 1).unwrap().unwrap();
    assert_eq!(stranded.status, TargetStatus::Succeeded);

    // The remaining budget moved on past the settled rows
    assert_eq!(storage.max_target_id(TargetKind::Recipe).unwrap(), Some(7));
    assert_eq!(storage.count_recipes().unwrap(), 3);
}

#[tokio::test]
async fn test_stale_claims_are_reclaimed_on_the_next_run() {
    let server = MockServer::start().await;
    mount_recipe(&server, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");
    let config = create_test_config(
        &server.uri(),
        db_path.to_str().unwrap(),
        dir.path().join("images").to_str().unwrap(),
    );

    // Simulate a crashed run: the target was claimed an hour ago and never
    // got a terminal update
    {
        let mut storage = SqliteStorage::new(Path::new(&config.output.database_path)).unwrap();
        storage
            .insert_pending_targets(TargetKind::Recipe, &[(1, None)])
            .unwrap();
        storage
            .claim_targets(
                TargetKind::Recipe,
                &[1],
                chrono::Utc::now() - chrono::Duration::hours(1),
            )
            .unwrap();
    }

    let options = HarvestOptions {
        start_id: Some(1),
        end_id: Some(1),
        max_count: None,
        force_retry: false,
    };
    let summary = run_harvest(config, "h", options, no_stop()).await.unwrap();

    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.succeeded, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_recipes().unwrap(), 1);
}

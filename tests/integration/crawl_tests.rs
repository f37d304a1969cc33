//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the remote catalog API and
//! exercise full crawl cycles against real state logs and artifact files.

use catalog_harvest::client::ThrottledClient;
use catalog_harvest::config::{ApiConfig, Config, CrawlerConfig, LoaderConfig};
use catalog_harvest::crawler::{list_artifacts, Crawler};
use catalog_harvest::decode::decode_file;
use catalog_harvest::loader::load_applications;
use catalog_harvest::state::{log_path, ProcessingOutcome, ProcessingState};
use catalog_harvest::storage::SqliteStore;
use catalog_harvest::{Dataset, RawRecord, WorkItem};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::tempdir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(server_uri: &str, dir: &Path, batch_size: usize) -> Config {
    Config {
        api: ApiConfig {
            catalog_url: format!("{}/applist", server_uri),
            store_base_url: server_uri.to_string(),
            user_agent: "TestHarvester/1.0".to_string(),
            request_delay_ms: 5, // Very short for testing
            request_timeout_secs: 20,
            catalog_timeout_secs: 20,
            max_attempts: 3,
            backoff_base: 2,
            backoff_unit_ms: 10,
            jitter_ms: 10,
        },
        crawler: CrawlerConfig {
            state_dir: dir.join("state"),
            data_dir: dir.join("data"),
            batch_size,
        },
        loader: LoaderConfig {
            database_path: dir.join("catalog.db"),
            batch_size: 1000,
            review_batch_size: 2000,
            busy_timeout_secs: 5,
        },
    }
}

fn app_details(appid: u64, name: &str) -> Value {
    let mut body = serde_json::Map::new();
    body.insert(
        appid.to_string(),
        json!({
            "success": true,
            "data": {
                "type": "game",
                "steam_appid": appid,
                "name": name,
                "developers": ["Test Studio"],
                "genres": [{"id": "1", "description": "Action"}]
            }
        }),
    );
    Value::Object(body)
}

async fn mount_app(server: &MockServer, appid: u64, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api/appdetails"))
        .and(query_param("appids", appid.to_string()))
        .respond_with(response)
        .mount(server)
        .await;
}

fn universe() -> Vec<WorkItem> {
    vec![
        WorkItem::new(10, "A"),
        WorkItem::new(20, "B"),
        WorkItem::new(30, "C"),
    ]
}

fn artifact_appids(path: &PathBuf) -> Vec<u64> {
    decode_file::<Value>(path)
        .unwrap()
        .map(|element| element.unwrap()["data"]["steam_appid"].as_u64().unwrap())
        .collect()
}

fn read_log(config: &Config, dataset: Dataset, outcome: ProcessingOutcome) -> String {
    std::fs::read_to_string(log_path(&config.crawler.state_dir, dataset, outcome)).unwrap()
}

#[tokio::test]
async fn test_scenario_with_one_missing_item() {
    let server = MockServer::start().await;
    mount_app(&server, 10, ResponseTemplate::new(200).set_body_json(app_details(10, "A"))).await;
    mount_app(&server, 20, ResponseTemplate::new(404)).await;
    mount_app(&server, 30, ResponseTemplate::new(200).set_body_json(app_details(30, "C"))).await;

    let dir = tempdir().unwrap();
    let config = create_test_config(&server.uri(), dir.path(), 2);

    let mut crawler = Crawler::open(&config, Dataset::Apps).unwrap();
    let summary = crawler.run(&universe()).await.unwrap();

    assert_eq!(summary.targeted, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.failed_by_kind["not_found"], 1);

    // State logs hold every outcome
    assert_eq!(read_log(&config, Dataset::Apps, ProcessingOutcome::Succeeded), "10\n30\n");
    assert_eq!(read_log(&config, Dataset::Apps, ProcessingOutcome::PermanentlyFailed), "20\n");

    // Successes fill exactly one batch of two, in processing order
    let artifacts = list_artifacts(&config.crawler.data_dir, Dataset::Apps).unwrap();
    assert_eq!(artifacts.len(), 1);
    assert!(artifacts[0].ends_with("steam_data_batch_00001.json"));
    assert_eq!(artifact_appids(&artifacts[0]), vec![10, 30]);

    // Loading the artifacts yields exactly two fact rows
    let mut store = SqliteStore::open(&config.loader.database_path, Duration::from_secs(5)).unwrap();
    let loaded = load_applications(&mut store, &artifacts, &config.loader).unwrap();
    assert_eq!(loaded.facts_inserted, 2);
    assert_eq!(store.count_rows("applications").unwrap(), 2);
}

#[tokio::test]
async fn test_partial_batch_is_flushed_at_end_of_run() {
    let server = MockServer::start().await;
    for (appid, name) in [(10, "A"), (20, "B"), (30, "C")] {
        mount_app(&server, appid, ResponseTemplate::new(200).set_body_json(app_details(appid, name))).await;
    }

    let dir = tempdir().unwrap();
    let config = create_test_config(&server.uri(), dir.path(), 2);

    let mut crawler = Crawler::open(&config, Dataset::Apps).unwrap();
    let summary = crawler.run(&universe()).await.unwrap();

    assert_eq!(summary.artifacts.len(), 2);
    assert_eq!(artifact_appids(&summary.artifacts[0]), vec![10, 20]);
    assert_eq!(artifact_appids(&summary.artifacts[1]), vec![30]);
    assert_eq!(crawler.buffered(), 0);
}

#[tokio::test]
async fn test_resume_issues_no_requests_for_recorded_items() {
    let dir = tempdir().unwrap();

    {
        let server = MockServer::start().await;
        mount_app(&server, 10, ResponseTemplate::new(200).set_body_json(app_details(10, "A"))).await;
        mount_app(&server, 20, ResponseTemplate::new(404)).await;
        mount_app(&server, 30, ResponseTemplate::new(200).set_body_json(app_details(30, "C"))).await;

        let config = create_test_config(&server.uri(), dir.path(), 2);
        let mut crawler = Crawler::open(&config, Dataset::Apps).unwrap();
        crawler.run(&universe()).await.unwrap();
    }

    // Second run against a server that knows nothing
    let server = MockServer::start().await;
    let config = create_test_config(&server.uri(), dir.path(), 2);
    let mut crawler = Crawler::open(&config, Dataset::Apps).unwrap();
    let summary = crawler.run(&universe()).await.unwrap();

    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.targeted, 0);
    assert_eq!(summary.http_attempts, 0);
    assert!(summary.artifacts.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());

    // No new artifact either
    let artifacts = list_artifacts(&config.crawler.data_dir, Dataset::Apps).unwrap();
    assert_eq!(artifacts.len(), 1);
}

#[tokio::test]
async fn test_request_delay_follows_each_completed_call() {
    let server = MockServer::start().await;
    for (appid, name) in [(10, "A"), (20, "B"), (30, "C")] {
        mount_app(
            &server,
            appid,
            ResponseTemplate::new(200)
                .set_body_json(app_details(appid, name))
                .set_delay(Duration::from_millis(150)),
        )
        .await;
    }

    let dir = tempdir().unwrap();
    let mut config = create_test_config(&server.uri(), dir.path(), 10);
    config.api.request_delay_ms = 200;

    let mut crawler = Crawler::open(&config, Dataset::Apps).unwrap();
    let start = std::time::Instant::now();
    let summary = crawler.run(&universe()).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(summary.succeeded, 3);
    // Three slow responses plus a full pause between each pair of calls
    assert!(
        elapsed >= Duration::from_millis(3 * 150 + 2 * 200),
        "crawl took only {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_duplicate_ids_are_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/appdetails"))
        .and(query_param("appids", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(app_details(10, "A")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = create_test_config(&server.uri(), dir.path(), 10);
    let items = vec![WorkItem::new(10, "A"), WorkItem::new(10, "A again")];

    let mut crawler = Crawler::open(&config, Dataset::Apps).unwrap();
    let summary = crawler.run(&items).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn test_rate_limited_backoff_never_shrinks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/appdetails"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = create_test_config(&server.uri(), dir.path(), 2);
    let mut client = ThrottledClient::new(&config.api).unwrap();

    let report = client.fetch_with_report(Dataset::Apps, 10).await;

    assert_eq!(report.attempts, 3);
    assert!(matches!(report.record, RawRecord::TransientFailure { .. }));
    // Sleeps happen between attempts only
    assert_eq!(report.backoff_delays.len(), 2);
    assert!(report.backoff_delays.windows(2).all(|w| w[0] <= w[1]));
    assert!(report.backoff_delays[0] >= Duration::from_millis(10));
    assert!(report.backoff_delays[1] >= Duration::from_millis(20));
}

#[tokio::test]
async fn test_exhausted_retries_end_as_failure() {
    let server = MockServer::start().await;
    mount_app(&server, 10, ResponseTemplate::new(503)).await;
    mount_app(&server, 20, ResponseTemplate::new(200).set_body_json(app_details(20, "B"))).await;

    let dir = tempdir().unwrap();
    let config = create_test_config(&server.uri(), dir.path(), 10);
    let items = vec![WorkItem::new(10, "A"), WorkItem::new(20, "B")];

    let mut crawler = Crawler::open(&config, Dataset::Apps).unwrap();
    let summary = crawler.run(&items).await.unwrap();

    assert_eq!(summary.failed_by_kind["transient_failure"], 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.http_attempts, 4);
    assert_eq!(read_log(&config, Dataset::Apps, ProcessingOutcome::PermanentlyFailed), "10\n");
}

#[tokio::test]
async fn test_terminal_outcomes_do_not_retry() {
    let server = MockServer::start().await;
    for (appid, response) in [
        (10, ResponseTemplate::new(403)),
        (20, ResponseTemplate::new(200).set_body_string("<html>maintenance</html>")),
        (30, ResponseTemplate::new(200).set_body_json(json!({"30": {"success": false}}))),
    ] {
        Mock::given(method("GET"))
            .and(path("/api/appdetails"))
            .and(query_param("appids", appid.to_string()))
            .respond_with(response)
            .expect(1)
            .mount(&server)
            .await;
    }

    let dir = tempdir().unwrap();
    let config = create_test_config(&server.uri(), dir.path(), 10);

    let mut crawler = Crawler::open(&config, Dataset::Apps).unwrap();
    let summary = crawler.run(&universe()).await.unwrap();

    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failed_by_kind["restricted"], 1);
    assert_eq!(summary.failed_by_kind["malformed"], 1);
    assert_eq!(summary.failed_by_kind["not_found"], 1);
    assert_eq!(summary.http_attempts, 3);
    assert!(summary.artifacts.is_empty());
}

#[tokio::test]
async fn test_catalog_is_fetched_once_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/applist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "applist": {"apps": [
                {"appid": 10, "name": "A"},
                {"appid": 20, "name": "B"}
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = create_test_config(&server.uri(), dir.path(), 10);

    let mut first = Crawler::open(&config, Dataset::Apps).unwrap();
    let fetched = first.load_catalog(&config.crawler.state_dir).await.unwrap();

    let mut second = Crawler::open(&config, Dataset::Reviews).unwrap();
    let cached = second.load_catalog(&config.crawler.state_dir).await.unwrap();

    assert_eq!(fetched, vec![WorkItem::new(10, "A"), WorkItem::new(20, "B")]);
    assert_eq!(cached, fetched);
    assert!(config.crawler.state_dir.join("app_list.json").exists());
}

#[tokio::test]
async fn test_catalog_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/applist"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = create_test_config(&server.uri(), dir.path(), 10);
    let mut crawler = Crawler::open(&config, Dataset::Apps).unwrap();

    let err = crawler
        .load_catalog(&config.crawler.state_dir)
        .await
        .unwrap_err();
    assert_eq!(err.phase(), Some(catalog_harvest::Phase::Catalog));
    assert!(!config.crawler.state_dir.join("app_list.json").exists());
}

#[tokio::test]
async fn test_reviews_crawl_writes_review_batches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/appreviews/10"))
        .and(query_param("json", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1,
            "query_summary": {"num_reviews": 1},
            "reviews": [{"recommendationid": "501", "review": "Great", "voted_up": true}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appreviews/20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1,
            "reviews": []
        })))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = create_test_config(&server.uri(), dir.path(), 10);
    let items = vec![WorkItem::new(10, "A"), WorkItem::new(20, "B")];

    let mut crawler = Crawler::open(&config, Dataset::Reviews).unwrap();
    let summary = crawler.run(&items).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed(), 1);
    assert_eq!(read_log(&config, Dataset::Reviews, ProcessingOutcome::Succeeded), "10\n");

    let artifacts = list_artifacts(&config.crawler.data_dir, Dataset::Reviews).unwrap();
    assert_eq!(artifacts.len(), 1);
    assert!(artifacts[0].ends_with("reviews_batch_00001.json"));

    let elements: Vec<Value> = decode_file(&artifacts[0]).unwrap().map(Result::unwrap).collect();
    assert_eq!(elements[0]["appid"], json!(10));
    assert_eq!(elements[0]["reviews"]["reviews"][0]["recommendationid"], json!("501"));

    // The apps dataset keeps its own state
    let apps = ProcessingState::open(&config.crawler.state_dir, Dataset::Apps).unwrap();
    assert!(!apps.has_been_processed(10));
}

#[tokio::test]
async fn test_backfill_retries_failed_ids_only() {
    let dir = tempdir().unwrap();
    let server = MockServer::start().await;
    let config = create_test_config(&server.uri(), dir.path(), 10);

    {
        let mut state = ProcessingState::open(&config.crawler.state_dir, Dataset::Apps).unwrap();
        state.mark_succeeded(10).unwrap();
        state.mark_failed(20).unwrap();
    }

    Mock::given(method("GET"))
        .and(path("/api/appdetails"))
        .and(query_param("appids", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(app_details(20, "B")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/appdetails"))
        .and(query_param("appids", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(app_details(10, "A")))
        .expect(0)
        .mount(&server)
        .await;

    let mut crawler = Crawler::open(&config, Dataset::Apps).unwrap();
    let summary = crawler.backfill(&[10, 20, 20]).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 2);
    assert!(crawler.state().has_succeeded(20));

    let artifacts = list_artifacts(&config.crawler.data_dir, Dataset::Apps).unwrap();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifact_appids(&artifacts[0]), vec![20]);
}

#[tokio::test]
async fn test_interrupted_run_keeps_recorded_work() {
    let server = MockServer::start().await;
    mount_app(&server, 10, ResponseTemplate::new(200).set_body_json(app_details(10, "A"))).await;
    mount_app(&server, 20, ResponseTemplate::new(200).set_body_json(app_details(20, "B"))).await;
    mount_app(
        &server,
        30,
        ResponseTemplate::new(200)
            .set_body_json(app_details(30, "C"))
            .set_delay(Duration::from_secs(10)),
    )
    .await;

    let dir = tempdir().unwrap();
    let config = create_test_config(&server.uri(), dir.path(), 10);
    let mut crawler = Crawler::open(&config, Dataset::Apps).unwrap();

    // Stop the run while item 30 is in flight
    let items = universe();
    let stopped = tokio::time::timeout(Duration::from_secs(2), crawler.run(&items)).await;
    assert!(stopped.is_err());

    assert_eq!(crawler.buffered(), 2);
    assert!(crawler.state().has_succeeded(20));
    assert!(!crawler.state().has_been_processed(30));

    let path = crawler.flush_pending().unwrap().unwrap();
    assert_eq!(artifact_appids(&path), vec![10, 20]);
    assert_eq!(crawler.buffered(), 0);
}

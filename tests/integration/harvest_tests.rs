//! Integration tests for the harvester
//!
//! These tests use wiremock to serve a target page and run the full
//! fetch -> dedup -> persist cycle end-to-end.

use quote_harvest::config::Config;
use quote_harvest::crawler::harvest;
use quote_harvest::store::{Fingerprint, FINGERPRINT_LEN, RECORD_TERMINATOR};
use quote_harvest::{FetchError, HarvestError, StopReason, StoreError};
use std::collections::HashSet;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing both logs into `dir`
fn create_test_config(server: &MockServer, dir: &TempDir, dup_to_stop: u64) -> Config {
    let mut config = Config::new(format!("{}/quotes/", server.uri()));
    config.workers = 1;
    config.dup_to_stop = dup_to_stop;
    config.hash_file = dir.path().join("hash.bin");
    config.quotes_file = dir.path().join("quotes.txt");
    config.fetch.delay_ms = 5;
    config.fetch.retries = 0;
    config.pipeline.shutdown_grace_ms = 500;
    config
}

async fn mount_page(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/quotes/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body.to_string())
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn read_values(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .split_terminator(RECORD_TERMINATOR)
        .map(str::to_string)
        .collect()
}

fn read_fingerprints(path: &Path) -> Vec<Vec<u8>> {
    let raw = std::fs::read(path).unwrap_or_default();
    assert_eq!(raw.len() % FINGERPRINT_LEN, 0, "partial fingerprint record");
    raw.chunks_exact(FINGERPRINT_LEN).map(<[u8]>::to_vec).collect()
}

const REPEATING_PAGE: &str = r#"<html><body>
    <a href="/a">A</a>
    <a href="/b">B</a>
    <a href="/a">A again</a>
    <a href="https://elsewhere.example/c">C</a>
</body></html>"#;

#[tokio::test]
async fn test_full_run_stops_on_duplicate_threshold() {
    let server = MockServer::start().await;
    mount_page(&server, REPEATING_PAGE).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &dir, 3);

    let summary = harvest(&config, std::future::pending()).await.unwrap();

    assert_eq!(summary.reason, StopReason::DuplicateThreshold);
    assert_eq!(summary.distinct, 3);

    let base = server.uri();
    let values = read_values(&config.quotes_file);
    assert_eq!(
        values,
        vec![
            format!("{}/a", base),
            format!("{}/b", base),
            "https://elsewhere.example/c".to_string(),
        ]
    );

    let fingerprints = read_fingerprints(&config.hash_file);
    assert_eq!(fingerprints.len(), values.len());
    for (fp, value) in fingerprints.iter().zip(&values) {
        assert_eq!(fp.as_slice(), Fingerprint::of(value.as_bytes()).as_bytes());
    }
}

#[tokio::test]
async fn test_restart_persists_nothing_new() {
    let server = MockServer::start().await;
    mount_page(&server, REPEATING_PAGE).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &dir, 3);

    harvest(&config, std::future::pending()).await.unwrap();
    let values_before = read_values(&config.quotes_file);
    let fingerprints_before = read_fingerprints(&config.hash_file);

    let summary = harvest(&config, std::future::pending()).await.unwrap();

    assert_eq!(summary.reason, StopReason::DuplicateThreshold);
    assert_eq!(summary.distinct, 3);
    assert_eq!(read_values(&config.quotes_file), values_before);
    assert_eq!(read_fingerprints(&config.hash_file), fingerprints_before);
}

#[tokio::test]
async fn test_many_workers_persist_each_value_once() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        r#"<html><body>
        <a href="/1">1</a><a href="/2">2</a><a href="/3">3</a>
        <a href="/4">4</a><a href="/5">5</a>
        </body></html>"#,
    )
    .await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, &dir, 25);
    config.workers = 4;
    config.pipeline.channel_capacity = 2;

    let summary = harvest(&config, std::future::pending()).await.unwrap();

    assert_eq!(summary.reason, StopReason::DuplicateThreshold);
    assert_eq!(summary.distinct, 5);

    let values = read_values(&config.quotes_file);
    let unique: HashSet<_> = values.iter().cloned().collect();
    assert_eq!(values.len(), 5);
    assert_eq!(unique.len(), 5);
    assert_eq!(read_fingerprints(&config.hash_file).len(), 5);
}

#[tokio::test]
async fn test_interrupt_stops_run() {
    let server = MockServer::start().await;
    mount_page(&server, REPEATING_PAGE).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &dir, 1000);

    let summary = harvest(&config, async {}).await.unwrap();

    assert_eq!(summary.reason, StopReason::Interrupted);
    assert_eq!(read_values(&config.quotes_file).len(), summary.distinct);
}

#[tokio::test]
async fn test_fetch_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &dir, 3);

    let result = harvest(&config, std::future::pending()).await;

    assert!(matches!(
        result,
        Err(HarvestError::Fetch(FetchError::Status { status: 500, .. }))
    ));
    assert!(read_values(&config.quotes_file).is_empty());
}

#[tokio::test]
async fn test_fetch_retried_before_failing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, &dir, 3);
    config.fetch.retries = 2;
    config.fetch.retry_backoff_ms = 1;

    let result = harvest(&config, std::future::pending()).await;
    assert!(matches!(result, Err(HarvestError::Fetch(_))));
}

#[tokio::test]
async fn test_corrupt_fingerprint_log_aborts_before_fetching() {
    let server = MockServer::start().await;
    mount_page(&server, REPEATING_PAGE).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &dir, 3);

    let mut raw = Fingerprint::of(b"ok").as_bytes().to_vec();
    raw.extend_from_slice(&[1, 2, 3]);
    std::fs::write(&config.hash_file, raw).unwrap();

    let result = harvest(&config, std::future::pending()).await;

    assert!(matches!(
        result,
        Err(HarvestError::Store(StoreError::Corrupt { trailing: 3, .. }))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(!config.quotes_file.exists());
}

#[tokio::test]
async fn test_empty_fingerprint_log_starts_empty() {
    let server = MockServer::start().await;
    mount_page(&server, r#"<a href="/only">only</a>"#).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &dir, 2);
    std::fs::write(&config.hash_file, b"").unwrap();

    let summary = harvest(&config, std::future::pending()).await.unwrap();

    assert_eq!(summary.distinct, 1);
    assert_eq!(
        read_values(&config.quotes_file),
        vec![format!("{}/only", server.uri())]
    );
}

#[tokio::test]
async fn test_href_with_embedded_newlines_is_one_record() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "<html><body>\
         <a href=\"/a\">A</a>\
         <a href=\"https://split.example/x&#10;&#10;&#10;y\">X</a>\
         </body></html>",
    )
    .await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, &dir, 3);

    let summary = harvest(&config, std::future::pending()).await.unwrap();

    assert_eq!(summary.reason, StopReason::DuplicateThreshold);
    assert_eq!(summary.distinct, 2);

    let values = read_values(&config.quotes_file);
    assert_eq!(
        values,
        vec![
            format!("{}/a", server.uri()),
            "https://split.example/xy".to_string(),
        ]
    );
    assert_eq!(read_fingerprints(&config.hash_file).len(), values.len());
}

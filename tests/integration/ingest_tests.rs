//! Integration tests for ingestion runs
//!
//! These tests use wiremock to serve a listing page and detail pages and
//! drive complete runs end-to-end against an on-disk catalog.

use chrono::{DateTime, Duration, TimeZone, Utc};
use marquee::catalog::{fingerprint_fields, import_entry, Actor};
use marquee::clock::ManualClock;
use marquee::config::{
    CatalogConfig, Config, PipelineConfig, ScheduleConfig, SourceConfig, UserAgentConfig,
};
use marquee::crawler::{Coordinator, HttpFetcher};
use marquee::storage::{CatalogStore, RunStatus, SqliteCatalog};
use marquee::{LifecycleStatus, MarqueeError};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING_PATH: &str = "/sydney/events";
const A_PATH: &str = "/sydney/music/jazz-night";
const B_PATH: &str = "/sydney/music/mystery-gig";

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, db_path: &str) -> Config {
    Config {
        source: SourceConfig {
            name: "TimeOut".to_string(),
            listing_url: format!("{}{}", base_url, LISTING_PATH),
            path_prefix: "/sydney/".to_string(),
            exclude_patterns: vec!["events/sydney".to_string()],
            min_path_segments: 3,
            default_city: "Sydney".to_string(),
            utc_offset: "+10:00".to_string(),
        },
        pipeline: PipelineConfig {
            max_links_per_run: 20,
            max_concurrent_fetches: 2,
            fetch_timeout_secs: 5,
            run_timeout_secs: None,
            description_max_length: 300,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        catalog: CatalogConfig {
            database_path: db_path.to_string(),
            stale_after_hours: 72,
        },
        schedule: ScheduleConfig::default(),
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 20, 0, 0, 0).unwrap()
}

fn detail_page(description: &str, venue: &str) -> String {
    format!(
        r#"<html><body>
            <h1>Jazz Night</h1>
            <p>{}</p>
            <time datetime="2024-05-01T20:00:00+10:00">1 May, 8pm</time>
            <address>{}</address>
            <img src="/images/jazz.jpg">
        </body></html>"#,
        description, venue
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html")
}

/// Replaces every mock with the listing page, A's detail page and an unusable B
async fn mount_site(server: &MockServer, a_page: String) {
    server.reset().await;

    // A appears twice on the listing page
    let listing = format!(
        r#"<html><body>
            <a href="{a}">Jazz Night</a>
            <a href="{b}">Mystery Gig</a>
            <a href="{a}">Jazz Night again</a>
            <a href="/sydney/music">All music</a>
        </body></html>"#,
        a = A_PATH,
        b = B_PATH
    );

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(html(listing))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(A_PATH))
        .respond_with(html(a_page))
        .mount(server)
        .await;

    // No date: unusable
    Mock::given(method("GET"))
        .and(path(B_PATH))
        .respond_with(html("<h1>Mystery Gig</h1><p>Date TBA</p>".to_string()))
        .mount(server)
        .await;
}

fn coordinator(
    server: &MockServer,
    dir: &tempfile::TempDir,
    clock: Arc<ManualClock>,
) -> Coordinator<SqliteCatalog> {
    let db_path = dir.path().join("catalog.db");
    let config = create_test_config(&server.uri(), db_path.to_str().unwrap());
    let store = SqliteCatalog::new(&db_path).expect("Failed to open catalog");
    let fetcher = HttpFetcher::from_config(
        &config.user_agent,
        std::time::Duration::from_secs(config.pipeline.fetch_timeout_secs),
    )
    .expect("Failed to build fetcher");

    Coordinator::new(config, "test-hash", store, Arc::new(fetcher), clock)
}

#[tokio::test]
async fn test_four_run_lifecycle() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let coordinator = coordinator(&mock_server, &dir, clock.clone());
    let a_url = format!("{}{}", mock_server.uri(), A_PATH);

    // Run 1: A is created, B is skipped
    mount_site(&mock_server, detail_page("A late set.", "The Basement")).await;
    let summary = coordinator.run_once().await.expect("Run 1 failed");

    assert_eq!(summary.discovered, 2);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);

    let first = coordinator
        .lock_store()
        .unwrap()
        .find_by_source_url(&a_url)
        .unwrap()
        .expect("A should be in the catalog");
    assert_eq!(first.status, LifecycleStatus::New);
    assert_eq!(first.title, "Jazz Night");
    assert_eq!(first.venue_name, "The Basement");
    assert_eq!(first.city, "Sydney");
    assert_eq!(first.source_name, "TimeOut");
    assert_eq!(
        first.occurs_at,
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    );
    assert_eq!(
        first.image_url,
        Some(format!("{}/images/jazz.jpg", mock_server.uri()))
    );
    assert_eq!(first.last_seen_at, t0());
    assert_eq!(coordinator.lock_store().unwrap().count_entries().unwrap(), 1);

    // Run 2: unchanged content, only last_seen_at moves
    clock.advance(Duration::hours(6));
    mount_site(&mock_server, detail_page("A late set.", "The Basement")).await;
    let summary = coordinator.run_once().await.expect("Run 2 failed");

    assert_eq!(summary.touched, 1);
    assert_eq!(summary.created + summary.updated, 0);

    let second = coordinator
        .lock_store()
        .unwrap()
        .find_by_source_url(&a_url)
        .unwrap()
        .unwrap();
    assert_eq!(second.status, LifecycleStatus::New);
    assert_eq!(second.content_fingerprint, first.content_fingerprint);
    assert_eq!(second.description, first.description);
    assert_eq!(second.first_seen_at, t0());
    assert_eq!(second.last_seen_at, t0() + Duration::hours(6));

    // Run 3: description changed
    clock.advance(Duration::hours(6));
    mount_site(&mock_server, detail_page("Now with a guest.", "The Basement")).await;
    let summary = coordinator.run_once().await.expect("Run 3 failed");

    assert_eq!(summary.updated, 1);

    let third = coordinator
        .lock_store()
        .unwrap()
        .find_by_source_url(&a_url)
        .unwrap()
        .unwrap();
    assert_eq!(third.status, LifecycleStatus::Updated);
    assert_eq!(third.description, "Now with a guest.");
    assert_ne!(third.content_fingerprint, first.content_fingerprint);
    assert_eq!(
        third.content_fingerprint,
        fingerprint_fields(
            "Jazz Night",
            third.occurs_at,
            "The Basement",
            "Now with a guest."
        )
    );

    // Operator import, then run 4 with a changed venue
    import_entry(
        &mut *coordinator.lock_store().unwrap(),
        &a_url,
        &Actor::Operator("ops@example.com".to_string()),
        Some("Featured"),
        t0() + Duration::hours(13),
    )
    .expect("Import failed");

    clock.advance(Duration::hours(6));
    mount_site(&mock_server, detail_page("Now with a guest.", "The Vanguard")).await;
    let summary = coordinator.run_once().await.expect("Run 4 failed");

    assert_eq!(summary.touched, 1);
    assert_eq!(summary.updated, 0);

    let fourth = coordinator
        .lock_store()
        .unwrap()
        .find_by_source_url(&a_url)
        .unwrap()
        .unwrap();
    assert_eq!(fourth.status, LifecycleStatus::Imported);
    assert_eq!(fourth.venue_name, "The Basement");
    assert_eq!(fourth.content_fingerprint, third.content_fingerprint);
    assert_eq!(fourth.imported_by.as_deref(), Some("ops@example.com"));
    assert_eq!(fourth.import_notes.as_deref(), Some("Featured"));
    assert_eq!(fourth.imported_at, Some(t0() + Duration::hours(13)));
    assert_eq!(fourth.last_seen_at, t0() + Duration::hours(18));

    let store = coordinator.lock_store().unwrap();
    assert_eq!(store.count_entries().unwrap(), 1);
    let runs = store.latest_runs(10).unwrap();
    assert_eq!(runs.len(), 4);
    assert!(runs.iter().all(|run| run.status == RunStatus::Completed));
    assert!(runs.iter().all(|run| run.config_hash == "test-hash"));
}

#[tokio::test]
async fn test_listing_unavailable_fails_run() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(&mock_server, &dir, Arc::new(ManualClock::new(t0())));

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let result = coordinator.run_once().await;
    assert!(matches!(result, Err(MarqueeError::ListingFetch(_))));

    let store = coordinator.lock_store().unwrap();
    assert_eq!(store.count_entries().unwrap(), 0);
    let runs = store.latest_runs(1).unwrap();
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert!(runs[0].error_message.as_deref().unwrap().contains("503"));
}

#[tokio::test]
async fn test_missing_detail_page_counts_as_failed() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(&mock_server, &dir, Arc::new(ManualClock::new(t0())));

    let listing = format!(r#"<a href="{}">A</a><a href="{}">B</a>"#, A_PATH, B_PATH);
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(html(listing))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(A_PATH))
        .respond_with(html(detail_page("A late set.", "The Basement")))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(B_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let summary = coordinator.run_once().await.expect("Run failed");

    assert_eq!(summary.created, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(coordinator.lock_store().unwrap().count_entries().unwrap(), 1);
}

//! Run coordinator - main ingestion orchestration logic
//!
//! One run:
//! 1. Records the run in the ledger
//! 2. Fetches the listing page (failure aborts the run)
//! 3. Discovers detail links and keeps the first `max-links-per-run`
//! 4. Fetches, extracts and reconciles detail pages on a bounded pool
//! 5. Records the outcome counts in the ledger

use crate::catalog::{reconcile_and_store, ReconcileContext};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::crawler::{discover_links, Extractor, Fetcher, HttpFetcher, LinkOutcome, RunSummary};
use crate::storage::{CatalogStore, SqliteCatalog, StorageError, StorageResult};
use crate::{MarqueeError, Result};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use url::Url;

/// Main ingestion coordinator structure
pub struct Coordinator<S> {
    config: Arc<Config>,
    config_hash: String,
    store: Arc<Mutex<S>>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    extractor: Extractor,
}

impl<S: CatalogStore + Send> Coordinator<S> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The pipeline configuration
    /// * `config_hash` - Recorded on every run ledger row
    /// * `store` - The catalog backend
    /// * `fetcher` - Used for the listing page and every detail page
    /// * `clock` - Source of every written timestamp
    pub fn new(
        config: Config,
        config_hash: impl Into<String>,
        store: S,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let extractor = Extractor::from_config(&config);
        Self {
            config: Arc::new(config),
            config_hash: config_hash.into(),
            store: Arc::new(Mutex::new(store)),
            fetcher,
            clock,
            extractor,
        }
    }

    /// Locks the catalog backend; never held across an await point
    pub fn lock_store(&self) -> StorageResult<MutexGuard<'_, S>> {
        self.store
            .lock()
            .map_err(|_| StorageError::Database("catalog lock poisoned".to_string()))
    }

    /// Runs one ingestion pass over the listing page
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - Per-outcome counts; per-link failures are counted, not raised
    /// * `Err(MarqueeError::ListingFetch)` - The listing page could not be fetched
    /// * `Err(MarqueeError)` - Storage or configuration failure
    pub async fn run_once(&self) -> Result<RunSummary> {
        let listing_url = Url::parse(&self.config.source.listing_url)?;

        let run_id = self.lock_store()?.begin_run(
            &self.config.source.name,
            &self.config_hash,
            self.clock.now(),
        )?;
        tracing::info!(run_id, source = %self.config.source.name, "Starting ingestion run");

        let listing = match self.fetcher.fetch(&listing_url).await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(run_id, error = %e, "Listing page unavailable, aborting run");
                self.lock_store()?
                    .fail_run(run_id, &e.to_string(), self.clock.now())?;
                return Err(MarqueeError::ListingFetch(e));
            }
        };

        let links = discover_links(&listing, &listing_url, &self.config.source);
        let mut summary = RunSummary {
            discovered: links.len(),
            ..RunSummary::default()
        };

        let max_links = self.config.pipeline.max_links_per_run;
        if links.len() > max_links {
            tracing::info!(
                discovered = links.len(),
                max_links,
                "Bounding run to the first links in discovery order"
            );
        }

        let deadline = self
            .config
            .pipeline
            .run_timeout_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        let concurrency = self.config.pipeline.max_concurrent_fetches.max(1);

        let outcomes: Vec<LinkOutcome> = stream::iter(links.into_iter().take(max_links))
            .map(|url| async move { self.process_link(&url, deadline).await })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for outcome in &outcomes {
            summary.record(outcome);
        }

        self.lock_store()?
            .finish_run(run_id, &summary, self.clock.now())?;
        tracing::info!(run_id, %summary, "Ingestion run complete");

        Ok(summary)
    }

    /// Runs now, then once per `period` until `shutdown` resolves
    ///
    /// `shutdown` is polled during runs too, so an interrupted run is
    /// abandoned rather than waited for; its ledger row stays `running`.
    /// Returns the number of runs started.
    pub async fn watch<F, R>(&self, period: Duration, shutdown: F, mut on_run: R) -> usize
    where
        F: Future,
        R: FnMut(Result<RunSummary>),
    {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut runs = 0;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut shutdown => break,
            }

            runs += 1;
            tokio::select! {
                result = self.run_once() => on_run(result),
                _ = &mut shutdown => {
                    tracing::warn!("Shutdown requested during a run, abandoning it");
                    break;
                }
            }
        }

        runs
    }

    /// Fetches, extracts and reconciles one detail page
    async fn process_link(&self, url: &Url, deadline: Option<Instant>) -> LinkOutcome {
        if matches!(deadline, Some(d) if Instant::now() >= d) {
            tracing::debug!(url = %url, "Run deadline passed, deferring link");
            return LinkOutcome::Deferred;
        }

        let html = match self.fetcher.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(error = %e, "Detail page fetch failed");
                return LinkOutcome::FetchFailed(e);
            }
        };

        let candidate = match self.extractor.extract(&html, url, self.clock.now()) {
            Ok(candidate) => candidate,
            Err(reason) => {
                tracing::info!(url = %url, %reason, "Skipping unusable page");
                return LinkOutcome::Unusable(reason);
            }
        };

        let ctx = ReconcileContext {
            now: self.clock.now(),
            default_city: &self.config.source.default_city,
        };

        let result = match self.lock_store() {
            Ok(mut store) => reconcile_and_store(&mut *store, &candidate, &ctx)
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(reconciliation) => {
                tracing::info!(
                    url = %url,
                    action = %reconciliation.action,
                    status = %reconciliation.entry.status,
                    "Entry reconciled"
                );
                LinkOutcome::Stored(reconciliation.action)
            }
            Err(message) => {
                tracing::warn!(url = %url, error = %message, "Failed to store entry");
                LinkOutcome::StoreFailed(message)
            }
        }
    }
}

/// Runs one ingestion pass with the production stack
///
/// Opens the configured SQLite catalog, builds the HTTP fetcher from the
/// `[user-agent]` table and uses the system clock.
///
/// # Example
///
/// ```no_run
/// use marquee::config::load_config_with_hash;
/// use marquee::crawler::run_once;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("marquee.toml"))?;
/// let summary = run_once(config, &hash).await?;
/// println!("{}", summary);
/// # Ok(())
/// # }
/// ```
pub async fn run_once(config: Config, config_hash: &str) -> Result<RunSummary> {
    let store = SqliteCatalog::new(Path::new(&config.catalog.database_path))?;
    let coordinator = production_coordinator(config, config_hash, store)?;
    coordinator.run_once().await
}

/// Builds a coordinator over `store` with the HTTP fetcher and system clock
pub fn production_coordinator<S: CatalogStore + Send>(
    config: Config,
    config_hash: &str,
    store: S,
) -> Result<Coordinator<S>> {
    let timeout = Duration::from_secs(config.pipeline.fetch_timeout_secs);
    let fetcher = HttpFetcher::from_config(&config.user_agent, timeout)?;
    Ok(Coordinator::new(
        config,
        config_hash,
        store,
        Arc::new(fetcher),
        Arc::new(SystemClock),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{
        CatalogConfig, PipelineConfig, ScheduleConfig, SourceConfig, UserAgentConfig,
    };
    use crate::crawler::{FetchCause, FetchError};
    use crate::state::LifecycleStatus;
    use crate::storage::RunStatus;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    const LISTING: &str = "https://www.timeout.com/sydney/events";

    /// Serves pages from memory; unknown URLs are 404s
    struct StaticFetcher {
        pages: HashMap<String, String>,
        timed_out: Vec<String>,
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, url: &Url) -> std::result::Result<String, FetchError> {
            if self.timed_out.iter().any(|t| t == url.as_str()) {
                return Err(FetchError::new(url, FetchCause::Timeout));
            }
            self.pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| FetchError::new(url, FetchCause::Status(404)))
        }
    }

    /// Never answers detail pages
    struct StallingFetcher {
        listing: String,
    }

    #[async_trait]
    impl Fetcher for StallingFetcher {
        async fn fetch(&self, url: &Url) -> std::result::Result<String, FetchError> {
            if url.as_str() == LISTING {
                return Ok(self.listing.clone());
            }
            std::future::pending().await
        }
    }

    fn create_test_config() -> Config {
        Config {
            source: SourceConfig {
                name: "TimeOut".to_string(),
                listing_url: LISTING.to_string(),
                path_prefix: "/sydney/".to_string(),
                exclude_patterns: vec!["events/sydney".to_string()],
                min_path_segments: 3,
                default_city: "Sydney".to_string(),
                utc_offset: "+10:00".to_string(),
            },
            pipeline: PipelineConfig {
                max_links_per_run: 20,
                max_concurrent_fetches: 4,
                fetch_timeout_secs: 5,
                run_timeout_secs: None,
                description_max_length: 300,
            },
            user_agent: UserAgentConfig {
                crawler_name: "TestCrawler".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            catalog: CatalogConfig {
                database_path: ":memory:".to_string(),
                stale_after_hours: 72,
            },
            schedule: ScheduleConfig::default(),
        }
    }

    fn detail_url(slug: &str) -> String {
        format!("https://www.timeout.com/sydney/music/{}", slug)
    }

    fn detail_page(title: &str) -> String {
        format!(
            "<h1>{}</h1><p>Live music.</p><time datetime=\"2024-05-01T20:00:00+10:00\"></time><address>Town Hall</address>",
            title
        )
    }

    fn listing_page(slugs: &[&str]) -> String {
        slugs
            .iter()
            .map(|slug| format!("<a href=\"/sydney/music/{}\">{}</a>", slug, slug))
            .collect()
    }

    fn coordinator(config: Config, pages: HashMap<String, String>) -> Coordinator<SqliteCatalog> {
        with_fetcher(
            config,
            StaticFetcher {
                pages,
                timed_out: Vec::new(),
            },
        )
    }

    fn with_fetcher(config: Config, fetcher: impl Fetcher + 'static) -> Coordinator<SqliteCatalog> {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 4, 20, 9, 0, 0).unwrap());
        Coordinator::new(
            config,
            "hash",
            SqliteCatalog::open_in_memory().unwrap(),
            Arc::new(fetcher),
            Arc::new(clock),
        )
    }

    #[tokio::test]
    async fn test_counts_each_outcome() {
        let mut pages = HashMap::new();
        pages.insert(LISTING.to_string(), listing_page(&["good", "broken", "gone"]));
        pages.insert(detail_url("good"), detail_page("Good Gig"));
        pages.insert(detail_url("broken"), "<p>No heading</p>".to_string());

        let coordinator = coordinator(create_test_config(), pages);
        let summary = coordinator.run_once().await.unwrap();

        assert_eq!(summary.discovered, 3);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);

        let store = coordinator.lock_store().unwrap();
        assert_eq!(store.count_entries().unwrap(), 1);
        let runs = store.latest_runs(1).unwrap();
        assert_eq!(runs[0].status, RunStatus::Completed);
        assert_eq!(runs[0].created, 1);
        assert_eq!(runs[0].failed, 1);
    }

    #[tokio::test]
    async fn test_timed_out_detail_leaves_siblings_alone() {
        let mut pages = HashMap::new();
        pages.insert(LISTING.to_string(), listing_page(&["a", "slow", "b"]));
        pages.insert(detail_url("a"), detail_page("A"));
        pages.insert(detail_url("slow"), detail_page("Slow"));
        pages.insert(detail_url("b"), detail_page("B"));

        let fetcher = StaticFetcher {
            pages,
            timed_out: vec![detail_url("slow")],
        };
        let coordinator = with_fetcher(create_test_config(), fetcher);
        let summary = coordinator.run_once().await.unwrap();

        assert_eq!(summary.discovered, 3);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.failed, 1);

        let store = coordinator.lock_store().unwrap();
        assert!(store.find_by_source_url(&detail_url("a")).unwrap().is_some());
        assert!(store.find_by_source_url(&detail_url("b")).unwrap().is_some());
        assert!(store.find_by_source_url(&detail_url("slow")).unwrap().is_none());
        assert_eq!(store.latest_runs(1).unwrap()[0].status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_watch_runs_immediately_then_stops_on_shutdown() {
        let mut pages = HashMap::new();
        pages.insert(LISTING.to_string(), listing_page(&["a"]));
        pages.insert(detail_url("a"), detail_page("A"));
        let coordinator = coordinator(create_test_config(), pages);

        let mut created = 0;
        let runs = coordinator
            .watch(
                Duration::from_secs(3600),
                tokio::time::sleep(Duration::from_millis(200)),
                |result| created += result.unwrap().created,
            )
            .await;

        assert_eq!(runs, 1);
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_watch_shutdown_interrupts_running_pass() {
        let fetcher = StallingFetcher {
            listing: listing_page(&["a"]),
        };
        let coordinator = with_fetcher(create_test_config(), fetcher);

        let mut finished = 0;
        let watched = tokio::time::timeout(
            Duration::from_secs(5),
            coordinator.watch(
                Duration::from_secs(3600),
                tokio::time::sleep(Duration::from_millis(100)),
                |_| finished += 1,
            ),
        )
        .await;

        assert_eq!(watched.unwrap(), 1);
        assert_eq!(finished, 0);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_run() {
        let coordinator = coordinator(create_test_config(), HashMap::new());

        let result = coordinator.run_once().await;
        assert!(matches!(result, Err(MarqueeError::ListingFetch(_))));

        let store = coordinator.lock_store().unwrap();
        assert_eq!(store.count_entries().unwrap(), 0);
        let runs = store.latest_runs(1).unwrap();
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert!(runs[0].error_message.as_deref().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn test_links_bounded_in_discovery_order() {
        let slugs = ["a", "b", "c", "d"];
        let mut pages = HashMap::new();
        pages.insert(LISTING.to_string(), listing_page(&slugs));
        for slug in slugs {
            pages.insert(detail_url(slug), detail_page(slug));
        }

        let mut config = create_test_config();
        config.pipeline.max_links_per_run = 2;
        let coordinator = coordinator(config, pages);
        let summary = coordinator.run_once().await.unwrap();

        assert_eq!(summary.discovered, 4);
        assert_eq!(summary.created, 2);

        let store = coordinator.lock_store().unwrap();
        assert!(store.find_by_source_url(&detail_url("a")).unwrap().is_some());
        assert!(store.find_by_source_url(&detail_url("b")).unwrap().is_some());
        assert!(store.find_by_source_url(&detail_url("c")).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_elapsed_run_deadline_defers_links() {
        let mut pages = HashMap::new();
        pages.insert(LISTING.to_string(), listing_page(&["a", "b"]));
        pages.insert(detail_url("a"), detail_page("A"));
        pages.insert(detail_url("b"), detail_page("B"));

        let mut config = create_test_config();
        config.pipeline.run_timeout_secs = Some(0);
        let coordinator = coordinator(config, pages);
        let summary = coordinator.run_once().await.unwrap();

        assert_eq!(summary.deferred, 2);
        assert_eq!(summary.created, 0);
        assert_eq!(coordinator.lock_store().unwrap().count_entries().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_second_run_touches() {
        let mut pages = HashMap::new();
        pages.insert(LISTING.to_string(), listing_page(&["a"]));
        pages.insert(detail_url("a"), detail_page("A"));

        let coordinator = coordinator(create_test_config(), pages);
        coordinator.run_once().await.unwrap();
        let summary = coordinator.run_once().await.unwrap();

        assert_eq!(summary.touched, 1);
        assert_eq!(summary.created, 0);

        let entry = coordinator
            .lock_store()
            .unwrap()
            .find_by_source_url(&detail_url("a"))
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, LifecycleStatus::New);
        assert_eq!(entry.city, "Sydney");
    }
}

//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Seeding the frontier from the configured categories
//! - Dispatching renders up to the concurrency limit
//! - Running listing and detail expansion on rendered pages
//! - Storing records and logging fetch outcomes
//! - Retrying failed fetches and handling stop requests

use crate::config::Config;
use crate::crawler::expansion::{
    claim_detail_url, expand_detail, expand_listing, DetailExpansion, ListingExpansion,
};
use crate::crawler::frontier::Frontier;
use crate::crawler::retry::{RetryDecision, RetryPolicy};
use crate::crawler::{FetchRequest, RequestKind};
use crate::extract::{Extractor, SelectorExtractor};
use crate::render::{build_http_client, FetchError, HttpRenderer, Renderer};
use crate::state::{FetchState, VisitedSet};
use crate::storage::{FetchLogEntry, ProductRecord, RunStatus, SqliteStorage, Storage};
use crate::CatalogError;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Asks a running crawl to stop dispatching new fetches
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Summary of one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub run_id: i64,
    /// Product records accepted by storage
    pub records_stored: u64,
    /// Product records storage rejected
    pub storage_failures: u64,
    /// Renders finished, successful or not
    pub fetch_attempts: u64,
    /// Failed renders sent back for another attempt
    pub retries: u64,
    /// Requests given up on after exhausting retries
    pub dropped: u64,
    /// Identifiers in the visited set at the end of the run
    pub identifiers_claimed: usize,
    /// The claim limit was hit and variant discovery stopped
    pub discovery_halted: bool,
    /// The run was stopped before the frontier drained
    pub interrupted: bool,
}

/// Everything a fetch task needs, shared read-only across tasks
struct TaskContext {
    renderer: Arc<dyn Renderer>,
    extractor: Arc<dyn Extractor>,
    visited: Arc<VisitedSet>,
    retry: RetryPolicy,
    fetch_timeout: Duration,
    max_listing_pages: Option<u32>,
}

enum TaskOutcome {
    Listing {
        request: FetchRequest,
        expansion: ListingExpansion,
    },
    Detail {
        request: FetchRequest,
        expansion: DetailExpansion,
    },
    Failed {
        request: FetchRequest,
        error: FetchError,
    },
    /// The fetch task panicked; the request is not retried
    Panicked {
        request: FetchRequest,
        message: String,
    },
}

/// Main crawler coordinator structure
///
/// Owns the frontier and the store; fetch tasks only share the visited set.
pub struct Coordinator<S: Storage> {
    context: Arc<TaskContext>,
    storage: S,
    frontier: Frontier,
    max_concurrent: usize,
    run_id: i64,
    stop: StopHandle,
    report: CrawlReport,
}

impl Coordinator<SqliteStorage> {
    /// Creates a coordinator backed by SQLite and the HTTP renderer
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash of the configuration file, recorded on the run
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(CatalogError)` - Failed to open the database or build the client
    pub fn from_config(config: &Config, config_hash: &str) -> Result<Self, CatalogError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        let client = build_http_client(
            &config.user_agent,
            Duration::from_millis(config.crawler.fetch_timeout_ms),
        )?;
        let renderer = HttpRenderer::new(client, config.crawler.max_side_requests);

        Self::new(
            config,
            config_hash,
            Arc::new(renderer),
            Arc::new(SelectorExtractor::new()),
            storage,
        )
    }
}

impl<S: Storage> Coordinator<S> {
    /// Creates a new coordinator instance
    ///
    /// Starts a new run in `storage` and seeds the frontier with the first
    /// listing page of every configured category.
    pub fn new(
        config: &Config,
        config_hash: &str,
        renderer: Arc<dyn Renderer>,
        extractor: Arc<dyn Extractor>,
        mut storage: S,
    ) -> Result<Self, CatalogError> {
        let crawler = &config.crawler;
        let run_id = storage.create_run(config_hash)?;

        let context = TaskContext {
            renderer,
            extractor,
            visited: Arc::new(VisitedSet::with_capacity_limit(
                crawler.max_claimed_identifiers,
            )),
            retry: RetryPolicy::new(
                crawler.max_retries,
                Duration::from_millis(crawler.retry_backoff_ms),
            ),
            fetch_timeout: Duration::from_millis(crawler.fetch_timeout_ms),
            max_listing_pages: crawler.max_listing_pages,
        };

        let mut frontier = Frontier::new();
        for category in &config.categories {
            frontier.push(FetchRequest::listing_seed(&category.name, &category.seed));
        }

        tracing::info!(
            "Run {}: seeded {} categories",
            run_id,
            config.categories.len()
        );

        Ok(Self {
            context: Arc::new(context),
            storage,
            frontier,
            max_concurrent: crawler.max_concurrent_fetches.max(1) as usize,
            run_id,
            stop: StopHandle::default(),
            report: CrawlReport {
                run_id,
                ..CrawlReport::default()
            },
        })
    }

    /// Adds a request to the frontier
    ///
    /// A detail request must also win the claim on the identifier anchored in
    /// its URL; every request is subject to URL dedup.
    pub fn enqueue(&mut self, request: FetchRequest) -> bool {
        if request.is_detail() && !claim_detail_url(&self.context.visited, &request.url) {
            tracing::debug!("Identifier of {} already claimed", request.url);
            return false;
        }
        self.frontier.push(request)
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn visited(&self) -> &VisitedSet {
        &self.context.visited
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Runs the crawl until the frontier is empty or a stop is requested
    ///
    /// After a stop request no new fetch is dispatched, but fetches already
    /// in flight are awaited and their results handled. The run is then
    /// marked interrupted instead of completed.
    pub async fn run(&mut self) -> Result<CrawlReport, CatalogError> {
        tracing::info!("Starting crawl run {}", self.run_id);

        let start_time = Instant::now();
        let mut in_flight: JoinSet<TaskOutcome> = JoinSet::new();
        let mut completed: u64 = 0;

        loop {
            let stopped = self.stop.is_stopped();
            if !stopped {
                while in_flight.len() < self.max_concurrent {
                    let Some(request) = self.frontier.pop() else {
                        break;
                    };
                    tracing::trace!(
                        "{} -> {}: {}",
                        FetchState::Pending,
                        FetchState::Fetching,
                        request.url
                    );
                    in_flight.spawn(supervise(Arc::clone(&self.context), request));
                }
            }

            // A retry in backoff wakes the loop when it is due and a slot is free
            let next_retry = if stopped {
                None
            } else {
                self.frontier.next_retry_at()
            };
            let joined = match (in_flight.is_empty(), next_retry) {
                (true, None) => break,
                (true, Some(due)) => {
                    tokio::time::sleep_until(due).await;
                    continue;
                }
                (false, Some(due)) if in_flight.len() < self.max_concurrent => {
                    tokio::select! {
                        joined = in_flight.join_next() => joined,
                        _ = tokio::time::sleep_until(due) => continue,
                    }
                }
                (false, _) => in_flight.join_next().await,
            };
            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok(outcome) => self.handle_outcome(outcome),
                Err(e) => {
                    // Only reachable if the supervising task itself fails
                    tracing::error!("Fetch task failed: {}", e);
                    self.report.fetch_attempts += 1;
                    self.report.dropped += 1;
                }
            }

            completed += 1;

            if completed % 10 == 0 {
                let rate = completed as f64 / start_time.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {} fetches, {} products stored, {} queued, {} in flight, {:.2} fetches/sec",
                    completed,
                    self.report.records_stored,
                    self.frontier.len(),
                    in_flight.len(),
                    rate
                );
            }
        }

        let interrupted = self.stop.is_stopped();
        let status = if interrupted {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        if self.frontier.waiting_count() > 0 {
            tracing::warn!(
                "{} retries still waiting at stop",
                self.frontier.waiting_count()
            );
        }
        self.storage.update_run_status(self.run_id, status)?;

        self.report.identifiers_claimed = self.context.visited.len();
        self.report.interrupted = interrupted;

        tracing::info!(
            "Crawl {}: {} products stored, {} fetches, {} retries, {} dropped in {:?}",
            status.to_db_string(),
            self.report.records_stored,
            self.report.fetch_attempts,
            self.report.retries,
            self.report.dropped,
            start_time.elapsed()
        );

        Ok(self.report.clone())
    }

    fn handle_outcome(&mut self, outcome: TaskOutcome) {
        self.report.fetch_attempts += 1;

        match outcome {
            TaskOutcome::Listing { request, expansion } => {
                if let RequestKind::Listing { page } = request.kind {
                    tracing::debug!(
                        "Listing '{}' page {}: {} products",
                        request.category,
                        page,
                        expansion.details.len()
                    );
                }
                if expansion.already_claimed > 0 {
                    tracing::debug!(
                        "{} tiles on {} were already claimed",
                        expansion.already_claimed,
                        request.url
                    );
                }
                self.log_fetch(&request, FetchState::Succeeded, None);

                for detail in expansion.details {
                    self.frontier.push(detail);
                }
                if let Some(next) = expansion.next_page {
                    self.frontier.push(next);
                }
            }
            TaskOutcome::Detail { request, expansion } => {
                self.store_record(&expansion.record);
                self.log_fetch(&request, FetchState::Succeeded, None);

                for sibling in expansion.siblings {
                    self.frontier.push(sibling);
                }

                if expansion.discovery_halted && !self.report.discovery_halted {
                    self.report.discovery_halted = true;
                    tracing::warn!(
                        "Claim limit reached with {} identifiers; variant discovery halted",
                        self.context.visited.len()
                    );
                }
            }
            TaskOutcome::Failed { request, error } => {
                match self.context.retry.on_failure(request) {
                    RetryDecision::Retry(request) => {
                        tracing::warn!(
                            "Retrying {} (attempt {} of {}): {}",
                            request.url,
                            request.attempts(),
                            self.context.retry.max_retries() + 1,
                            error
                        );
                        self.report.retries += 1;
                        let delay = self.context.retry.delay_for(&request);
                        self.frontier.push_retry(request, delay);
                    }
                    RetryDecision::GiveUp(request) => {
                        tracing::error!(
                            "Giving up on {} after {} attempts: {}",
                            request.url,
                            request.attempts(),
                            error
                        );
                        self.report.dropped += 1;
                        self.log_fetch(&request, FetchState::Failed, Some(error.to_string()));
                    }
                }
            }
            TaskOutcome::Panicked { request, message } => {
                tracing::error!("Fetch of {} panicked: {}", request.url, message);
                self.report.dropped += 1;
                self.log_fetch(
                    &request,
                    FetchState::Failed,
                    Some(format!("task panicked: {}", message)),
                );
            }
        }
    }

    fn store_record(&mut self, record: &ProductRecord) {
        match self.storage.upsert_product(self.run_id, record) {
            Ok(()) => self.report.records_stored += 1,
            Err(e) => {
                self.report.storage_failures += 1;
                tracing::error!("Failed to store product {}: {}", record.key(), e);
            }
        }
    }

    fn log_fetch(&mut self, request: &FetchRequest, state: FetchState, error: Option<String>) {
        debug_assert!(state.is_terminal());
        let entry = FetchLogEntry {
            url: request.url.clone(),
            kind: request.kind.as_str().to_string(),
            category: request.category.clone(),
            state,
            attempts: request.attempts(),
            depth: request.depth,
            error_message: error,
        };

        if let Err(e) = self.storage.record_fetch(self.run_id, &entry) {
            tracing::error!("Failed to log fetch of {}: {}", request.url, e);
        }
    }
}

/// Runs [`process_request`] in its own task and turns a panic into an outcome
async fn supervise(context: Arc<TaskContext>, request: FetchRequest) -> TaskOutcome {
    match tokio::spawn(process_request(context, request.clone())).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => {
            let payload = e.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            TaskOutcome::Panicked { request, message }
        }
        Err(e) => TaskOutcome::Panicked {
            request,
            message: e.to_string(),
        },
    }
}

/// Renders one request and expands the page
///
/// Render failures come back as [`TaskOutcome::Failed`]; retry backoff is
/// served by the frontier before the request is dispatched.
async fn process_request(context: Arc<TaskContext>, request: FetchRequest) -> TaskOutcome {
    let render = context
        .renderer
        .render(&request.url, request.wait_condition());

    // Dropping the render future on timeout releases its listeners
    let page = match tokio::time::timeout(context.fetch_timeout, render).await {
        Ok(Ok(page)) => page,
        Ok(Err(error)) => return TaskOutcome::Failed { request, error },
        Err(_) => {
            let error = FetchError::Timeout {
                url: request.url.clone(),
            };
            return TaskOutcome::Failed { request, error };
        }
    };

    match request.kind {
        RequestKind::Listing { .. } => {
            let expansion = expand_listing(
                &request,
                &page,
                &context.visited,
                context.max_listing_pages,
            );
            TaskOutcome::Listing { request, expansion }
        }
        RequestKind::Detail => {
            let expansion = expand_detail(
                &request,
                &page,
                context.extractor.as_ref(),
                &context.visited,
            );
            TaskOutcome::Detail { request, expansion }
        }
    }
}

/// Runs a complete crawl operation
///
/// Opens the database, seeds the frontier, and crawls until the frontier is
/// exhausted. Ctrl-C stops dispatching and lets in-flight fetches finish.
///
/// # Example
///
/// ```no_run
/// use catalog_ripple::config::load_config_with_hash;
/// use catalog_ripple::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
/// let report = run_crawl(&config, &hash).await?;
/// println!("{} products", report.records_stored);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: &Config, config_hash: &str) -> Result<CrawlReport, CatalogError> {
    let mut coordinator = Coordinator::from_config(config, config_hash)?;

    let stop = coordinator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight fetches");
            stop.stop();
        }
    });

    coordinator.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CategoryEntry, CrawlerConfig, OutputConfig, UserAgentConfig};
    use crate::render::{RenderedPage, WaitCondition};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    fn create_test_config() -> Config {
        Config {
            crawler: CrawlerConfig {
                max_concurrent_fetches: 2,
                max_retries: 1,
                retry_backoff_ms: 0,
                fetch_timeout_ms: 1000,
                max_claimed_identifiers: None,
                max_listing_pages: None,
                max_side_requests: 0,
            },
            user_agent: UserAgentConfig {
                crawler_name: "TestCrawler".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            output: OutputConfig {
                database_path: ":memory:".to_string(),
            },
            categories: vec![CategoryEntry {
                name: "gaming".to_string(),
                seed: "https://shop.example/s?k=gaming".to_string(),
            }],
        }
    }

    /// Fails every render and counts calls
    #[derive(Default)]
    struct FailingRenderer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Renderer for FailingRenderer {
        async fn render(&self, url: &str, _wait: WaitCondition) -> Result<RenderedPage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: 503,
            })
        }
    }

    struct PanickingRenderer;

    #[async_trait]
    impl Renderer for PanickingRenderer {
        async fn render(&self, _url: &str, _wait: WaitCondition) -> Result<RenderedPage, FetchError> {
            panic!("renderer exploded");
        }
    }

    #[test]
    fn test_stop_handle_is_shared() {
        let handle = StopHandle::default();
        let clone = handle.clone();
        assert!(!clone.is_stopped());
        handle.stop();
        assert!(clone.is_stopped());
    }

    #[tokio::test]
    async fn test_failing_seed_is_dropped_after_retries() {
        let renderer = Arc::new(FailingRenderer::default());
        let storage = SqliteStorage::new_in_memory().unwrap();
        let mut coordinator = Coordinator::new(
            &create_test_config(),
            "hash",
            renderer.clone(),
            Arc::new(SelectorExtractor::new()),
            storage,
        )
        .unwrap();

        let report = coordinator.run().await.unwrap();

        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.fetch_attempts, 2);
        assert_eq!(report.retries, 1);
        assert_eq!(report.dropped, 1);
        assert!(!report.interrupted);

        let failed = coordinator
            .storage()
            .get_failed_fetches(report.run_id)
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].attempts, 2);
        assert_eq!(failed[0].kind, "listing");

        let run = coordinator.storage().get_run(report.run_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_stop_before_run_marks_interrupted() {
        let renderer = Arc::new(FailingRenderer::default());
        let mut coordinator = Coordinator::new(
            &create_test_config(),
            "hash",
            renderer.clone(),
            Arc::new(SelectorExtractor::new()),
            SqliteStorage::new_in_memory().unwrap(),
        )
        .unwrap();

        coordinator.stop_handle().stop();
        let report = coordinator.run().await.unwrap();

        assert!(report.interrupted);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
        let run = coordinator.storage().get_run(report.run_id).unwrap();
        assert_eq!(run.status, RunStatus::Interrupted);
    }

    #[tokio::test]
    async fn test_panicking_fetch_is_dropped_and_logged() {
        let mut coordinator = Coordinator::new(
            &create_test_config(),
            "hash",
            Arc::new(PanickingRenderer),
            Arc::new(SelectorExtractor::new()),
            SqliteStorage::new_in_memory().unwrap(),
        )
        .unwrap();

        let report = coordinator.run().await.unwrap();

        assert_eq!(report.fetch_attempts, 1);
        assert_eq!(report.retries, 0);
        assert_eq!(report.dropped, 1);

        let failed = coordinator
            .storage()
            .get_failed_fetches(report.run_id)
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].url, "https://shop.example/s?k=gaming");
        assert!(failed[0]
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("renderer exploded"));
    }

    #[tokio::test]
    async fn test_enqueue_claims_detail_identifier() {
        let mut coordinator = Coordinator::new(
            &create_test_config(),
            "hash",
            Arc::new(FailingRenderer::default()),
            Arc::new(SelectorExtractor::new()),
            SqliteStorage::new_in_memory().unwrap(),
        )
        .unwrap();

        assert!(coordinator.enqueue(FetchRequest::detail_seed(
            "gaming",
            "https://shop.example/Mouse-Black/dp/AAAAAAAAAA"
        )));
        assert!(!coordinator.enqueue(FetchRequest::detail_seed(
            "gaming",
            "https://shop.example/Mouse-White/dp/AAAAAAAAAA"
        )));
        assert!(coordinator.enqueue(FetchRequest::detail_seed(
            "gaming",
            "https://shop.example/item?id=42"
        )));
        assert_eq!(coordinator.visited().len(), 1);
    }
}

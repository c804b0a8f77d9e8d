//! Page loop tests against scripted fetchers and browser sessions

use crate::common::{catalog_page, test_rotator};
use async_trait::async_trait;
use catalog_ripple::config::SelectorConfig;
use catalog_ripple::crawler::{
    run_scrape, BrowserDriver, BrowserSession, CatalogTemplate, FetchMode, PageFetcher,
    RetryPolicy, ScrapeRequest, SessionError,
};
use catalog_ripple::fingerprint::Fingerprint;
use catalog_ripple::pagination::PaginationGuard;
use catalog_ripple::state::{FailureReason, FetchOutcome, PageAction, PageRef, RawPage, StopReason};
use catalog_ripple::ScrapeError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

const BASE: &str = "https://books.example.com/catalogue/";

fn page_url(n: u32) -> String {
    format!("{}page-{}.html", BASE, n)
}

/// How a scripted URL responds
#[derive(Clone)]
enum Script {
    Page(String),
    /// Fails transiently `times` times, then serves the page
    Flaky { times: usize, body: String },
    Fail(FetchOutcome),
}

/// Serves scripted responses and records every attempt
#[derive(Default)]
struct ScriptedSite {
    scripts: HashMap<String, Script>,
    /// Where a click on a control without a target leads, keyed by the page it is on
    clicks: HashMap<String, String>,
    attempts: Mutex<Vec<(String, String)>>,
}

impl ScriptedSite {
    fn with(mut self, url: String, script: Script) -> Self {
        self.scripts.insert(url, script);
        self
    }

    fn with_click(mut self, from: String, to: String) -> Self {
        self.clicks.insert(from, to);
        self
    }

    fn respond(&self, url: &Url, fingerprint: &Fingerprint) -> FetchOutcome {
        let mut attempts = self.attempts.lock().unwrap();
        let previous = attempts.iter().filter(|(u, _)| u == url.as_str()).count();
        attempts.push((url.to_string(), fingerprint.identity().to_string()));

        match self.scripts.get(url.as_str()) {
            Some(Script::Page(body)) => FetchOutcome::Success(RawPage::new(url.clone(), body.clone())),
            Some(Script::Flaky { times, body }) if previous >= *times => {
                FetchOutcome::Success(RawPage::new(url.clone(), body.clone()))
            }
            Some(Script::Flaky { .. }) => {
                FetchOutcome::TransientFailure(FailureReason::ServerError { status: 503 })
            }
            Some(Script::Fail(outcome)) => outcome.clone(),
            None => FetchOutcome::PermanentFailure(FailureReason::NotFound { status: 404 }),
        }
    }

    fn attempts_for(&self, url: &str) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, identity)| identity.clone())
            .collect()
    }
}

struct ScriptedFetcher(Arc<ScriptedSite>);

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, page: &PageRef, fingerprint: &Fingerprint) -> FetchOutcome {
        match page.url() {
            Some(url) => self.0.respond(url, fingerprint),
            None => FetchOutcome::PermanentFailure(FailureReason::malformed("not a URL")),
        }
    }
}

/// A session over a scripted site that records actions and closure
struct ScriptedSession {
    site: Arc<ScriptedSite>,
    actions: Mutex<Vec<PageAction>>,
    location: Mutex<Option<String>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn perform(&self, action: &PageAction, fingerprint: &Fingerprint) -> FetchOutcome {
        self.actions.lock().unwrap().push(action.clone());
        let url = match action {
            PageAction::Navigate(url) => url.clone(),
            PageAction::ClickNext {
                target: Some(target),
                ..
            } => target.clone(),
            PageAction::ClickNext { target: None, .. } => {
                let location = self.location.lock().unwrap().clone();
                match location.and_then(|from| self.site.clicks.get(&from).cloned()) {
                    Some(to) => Url::parse(&to).unwrap(),
                    None => {
                        return FetchOutcome::PermanentFailure(FailureReason::malformed(
                            "click led nowhere",
                        ))
                    }
                }
            }
            other => {
                return FetchOutcome::PermanentFailure(FailureReason::malformed(format!(
                    "unsupported action {}",
                    other
                )))
            }
        };
        let outcome = self.site.respond(&url, fingerprint);
        if let FetchOutcome::Success(page) = &outcome {
            *self.location.lock().unwrap() = Some(page.url.to_string());
        }
        outcome
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct ScriptedDriver {
    site: Arc<ScriptedSite>,
    closed: Arc<AtomicBool>,
    fail_open: bool,
}

impl ScriptedDriver {
    fn new(site: Arc<ScriptedSite>) -> (Self, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let driver = Self {
            site,
            closed: closed.clone(),
            fail_open: false,
        };
        (driver, closed)
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn open(&self) -> Result<Arc<dyn BrowserSession>, SessionError> {
        if self.fail_open {
            return Err(SessionError::Launch("no browser available".to_string()));
        }
        Ok(Arc::new(ScriptedSession {
            site: self.site.clone(),
            actions: Mutex::new(Vec::new()),
            location: Mutex::new(None),
            closed: self.closed.clone(),
        }))
    }
}

/// Three pages of 10, 10 and 5 products; page 3 has no next control
fn three_pages() -> ScriptedSite {
    ScriptedSite::default()
        .with(page_url(1), Script::Page(catalog_page(1, 10, Some("page-2.html"))))
        .with(page_url(2), Script::Page(catalog_page(2, 10, Some("page-3.html"))))
        .with(page_url(3), Script::Page(catalog_page(3, 5, None)))
}

fn request(mode: FetchMode, max_products: usize) -> ScrapeRequest {
    ScrapeRequest {
        start: PageRef::Url(Url::parse(&page_url(1)).unwrap()),
        mode,
        max_products,
        retry_policy: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        },
        guard: PaginationGuard::default(),
        rotator: test_rotator(),
    }
}

fn static_mode(site: &Arc<ScriptedSite>) -> FetchMode {
    FetchMode::Static(Box::new(ScriptedFetcher(site.clone())))
}

fn extractor() -> CatalogTemplate {
    CatalogTemplate::from_config(&SelectorConfig::default()).unwrap()
}

#[tokio::test]
async fn test_unlimited_scrape_collects_every_page() {
    let site = Arc::new(three_pages());

    let outcome = run_scrape(request(static_mode(&site), 0), &extractor(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.items.len(), 25);
    assert_eq!(outcome.pages_visited, 3);
    assert_eq!(outcome.stop_reason, StopReason::NoNextPage);
    assert!(outcome.is_complete());
    assert_eq!(outcome.items[0].name, "Book 1-0");
    assert_eq!(outcome.items[24].name, "Book 3-4");
    assert_eq!(outcome.items[0].rating, Some(4));
    assert_eq!(
        outcome.items[0].url.as_deref(),
        Some("https://books.example.com/catalogue/catalogue/book-1-0.html")
    );
}

#[tokio::test]
async fn test_product_cap_stops_mid_page() {
    let site = Arc::new(three_pages());

    let outcome = run_scrape(request(static_mode(&site), 12), &extractor(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.items.len(), 12);
    assert_eq!(outcome.pages_visited, 2);
    assert_eq!(outcome.stop_reason, StopReason::MaxProductsReached);
    assert_eq!(outcome.items[11].name, "Book 2-1");
    assert!(site.attempts_for(&page_url(3)).is_empty());
}

#[tokio::test]
async fn test_cap_above_available_returns_everything() {
    let site = Arc::new(three_pages());

    let outcome = run_scrape(request(static_mode(&site), 100), &extractor(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.items.len(), 25);
    assert_eq!(outcome.stop_reason, StopReason::NoNextPage);
}

#[tokio::test]
async fn test_permanent_failure_keeps_collected_items() {
    let site = Arc::new(three_pages().with(
        page_url(2),
        Script::Fail(FetchOutcome::PermanentFailure(FailureReason::HttpStatus {
            status: 403,
        })),
    ));

    let outcome = run_scrape(request(static_mode(&site), 0), &extractor(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.items.len(), 10);
    assert_eq!(outcome.pages_visited, 1);
    assert_eq!(
        outcome.stop_reason,
        StopReason::FatalFetchFailure(FailureReason::HttpStatus { status: 403 })
    );
    // Permanent failures are never retried
    assert_eq!(site.attempts_for(&page_url(2)).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_are_fatal() {
    let site = Arc::new(three_pages().with(
        page_url(2),
        Script::Fail(FetchOutcome::TransientFailure(FailureReason::Timeout)),
    ));

    let outcome = run_scrape(request(static_mode(&site), 0), &extractor(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.items.len(), 10);
    assert_eq!(
        outcome.stop_reason,
        StopReason::FatalFetchFailure(FailureReason::Timeout)
    );
    assert_eq!(site.attempts_for(&page_url(2)).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_recover_with_fresh_fingerprints() {
    let site = Arc::new(three_pages().with(
        page_url(2),
        Script::Flaky {
            times: 2,
            body: catalog_page(2, 10, Some("page-3.html")),
        },
    ));

    let outcome = run_scrape(request(static_mode(&site), 0), &extractor(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.items.len(), 25);
    assert_eq!(outcome.stop_reason, StopReason::NoNextPage);

    let identities = site.attempts_for(&page_url(2));
    assert_eq!(identities.len(), 3);
    for pair in identities.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
}

#[tokio::test]
async fn test_next_control_pointing_back_ends_scrape() {
    let site = Arc::new(
        ScriptedSite::default()
            .with(page_url(1), Script::Page(catalog_page(1, 10, Some("page-2.html"))))
            .with(page_url(2), Script::Page(catalog_page(2, 10, Some("page-1.html")))),
    );

    let outcome = run_scrape(request(static_mode(&site), 0), &extractor(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.items.len(), 20);
    assert_eq!(outcome.pages_visited, 2);
    assert_eq!(outcome.stop_reason, StopReason::NoNextPage);
    assert_eq!(site.attempts_for(&page_url(1)).len(), 1);
}

#[tokio::test]
async fn test_page_guard_trips() {
    let site = Arc::new(three_pages());
    let mut request = request(static_mode(&site), 0);
    request.guard = PaginationGuard::new(2);

    let outcome = run_scrape(request, &extractor(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.items.len(), 20);
    assert_eq!(outcome.pages_visited, 2);
    assert_eq!(outcome.stop_reason, StopReason::MaxPagesGuardTripped);
    assert!(!outcome.is_complete());
}

#[tokio::test]
async fn test_invalid_policy_fails_before_fetching() {
    let site = Arc::new(three_pages());
    let mut request = request(static_mode(&site), 0);
    request.retry_policy.max_attempts = 0;

    let result = run_scrape(request, &extractor(), CancellationToken::new()).await;

    assert!(matches!(result, Err(ScrapeError::Config(_))));
    assert!(site.attempts.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_backoff() {
    let site = Arc::new(three_pages().with(
        page_url(2),
        Script::Fail(FetchOutcome::TransientFailure(FailureReason::RateLimited {
            retry_after: Some(Duration::from_secs(600)),
        })),
    ));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    let outcome = run_scrape(request(static_mode(&site), 0), &extractor(), cancel)
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Cancelled);
    assert_eq!(outcome.items.len(), 10);
    assert_eq!(site.attempts_for(&page_url(2)).len(), 1);
    assert!(started.elapsed() < Duration::from_secs(600));
}

#[tokio::test]
async fn test_dynamic_scrape_clicks_next_and_closes_session() {
    let site = Arc::new(three_pages());
    let (driver, closed) = ScriptedDriver::new(site.clone());

    let outcome = run_scrape(
        request(FetchMode::Dynamic(Box::new(driver)), 0),
        &extractor(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.items.len(), 25);
    assert_eq!(outcome.pages_visited, 3);
    assert_eq!(outcome.stop_reason, StopReason::NoNextPage);
    assert_eq!(outcome.mode, "dynamic");
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_targetless_click_looping_back_ends_scrape() {
    let site = Arc::new(
        ScriptedSite::default()
            .with(page_url(1), Script::Page(catalog_page(1, 10, Some("#"))))
            .with(page_url(2), Script::Page(catalog_page(2, 10, Some("#"))))
            .with_click(page_url(1), page_url(2))
            .with_click(page_url(2), page_url(1)),
    );
    let (driver, closed) = ScriptedDriver::new(site.clone());

    let outcome = run_scrape(
        request(FetchMode::Dynamic(Box::new(driver)), 0),
        &extractor(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.items.len(), 20);
    assert_eq!(outcome.pages_visited, 2);
    assert_eq!(outcome.stop_reason, StopReason::NoNextPage);
    assert_eq!(outcome.items[19].name, "Book 2-9");
    assert_eq!(site.attempts_for(&page_url(1)).len(), 2);
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_dynamic_session_closed_after_fatal_failure() {
    let site = Arc::new(three_pages().with(
        page_url(2),
        Script::Fail(FetchOutcome::PermanentFailure(FailureReason::NotFound {
            status: 404,
        })),
    ));
    let (driver, closed) = ScriptedDriver::new(site.clone());

    let outcome = run_scrape(
        request(FetchMode::Dynamic(Box::new(driver)), 0),
        &extractor(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.items.len(), 10);
    assert!(matches!(
        outcome.stop_reason,
        StopReason::FatalFetchFailure(_)
    ));
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_dynamic_session_closed_after_cancellation() {
    let site = Arc::new(three_pages().with(
        page_url(2),
        Script::Fail(FetchOutcome::TransientFailure(FailureReason::Timeout)),
    ));
    let (driver, closed) = ScriptedDriver::new(site.clone());
    let mut request = request(FetchMode::Dynamic(Box::new(driver)), 0);
    request.retry_policy.base_delay = Duration::from_secs(60);
    request.retry_policy.max_delay = Duration::from_secs(60);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let outcome = run_scrape(request, &extractor(), cancel).await.unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Cancelled);
    assert_eq!(outcome.items.len(), 10);
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_dynamic_scrape_dropped_mid_run_closes_session() {
    let site = Arc::new(three_pages().with(
        page_url(2),
        Script::Fail(FetchOutcome::TransientFailure(FailureReason::Timeout)),
    ));
    let (driver, closed) = ScriptedDriver::new(site.clone());
    let mut request = request(FetchMode::Dynamic(Box::new(driver)), 0);
    request.retry_policy.base_delay = Duration::from_secs(60);
    request.retry_policy.max_delay = Duration::from_secs(60);

    let extractor = extractor();
    let result = tokio::time::timeout(
        Duration::from_millis(200),
        run_scrape(request, &extractor, CancellationToken::new()),
    )
    .await;
    assert!(result.is_err());

    for _ in 0..10 {
        if closed.load(Ordering::SeqCst) {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_session_open_failure_is_an_error() {
    let site = Arc::new(three_pages());
    let (mut driver, closed) = ScriptedDriver::new(site.clone());
    driver.fail_open = true;

    let result = run_scrape(
        request(FetchMode::Dynamic(Box::new(driver)), 0),
        &extractor(),
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(ScrapeError::Session(_))));
    assert!(!closed.load(Ordering::SeqCst));
    assert!(site.attempts.lock().unwrap().is_empty());
}

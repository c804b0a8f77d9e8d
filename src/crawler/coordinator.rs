//! Scrape coordinator - the page loop
//!
//! This module drives one scrape from the start page to a stop reason:
//! - Drawing a fingerprint for every fetch attempt
//! - Fetching the current page through the retry scheduler
//! - Handing pages to the item extractor and enforcing the product cap
//! - Asking the pagination strategy for the next page
//! - Enforcing the page guard and honouring cancellation
//! - Opening and closing the browser session in dynamic mode

use crate::crawler::browser::{BrowserDriver, BrowserFetcher, SessionGuard};
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::parser::{ItemExtractor, ProductRecord};
use crate::crawler::scheduler::{AttemptResult, Cancelled, RetryPolicy, RetryScheduler};
use crate::fingerprint::FingerprintRotator;
use crate::pagination::{PaginationGuard, PaginationStrategy, PaginationVariant};
use crate::state::{FetchOutcome, PageRef, PaginationState, StopReason};
use crate::ScrapeError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// How pages are fetched
pub enum FetchMode {
    /// Plain HTTP requests; pagination produces URLs
    Static(Box<dyn PageFetcher>),

    /// A browser session; pagination produces actions
    Dynamic(Box<dyn BrowserDriver>),
}

impl FetchMode {
    /// The pagination variant matching this mode
    pub fn variant(&self) -> PaginationVariant {
        match self {
            Self::Static(_) => PaginationVariant::UrlRewrite,
            Self::Dynamic(_) => PaginationVariant::ActionDescriptor,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Static(_) => "static",
            Self::Dynamic(_) => "dynamic",
        }
    }
}

/// Everything one scrape needs
pub struct ScrapeRequest {
    pub start: PageRef,
    pub mode: FetchMode,
    /// Product cap; 0 means unlimited
    pub max_products: usize,
    pub retry_policy: RetryPolicy,
    pub guard: PaginationGuard,
    pub rotator: FingerprintRotator,
}

/// The result of a scrape
///
/// Returned for every stop reason, including fatal fetch failures and
/// cancellation, with the items collected up to that point.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub items: Vec<ProductRecord>,
    pub stop_reason: StopReason,
    pub pages_visited: u32,
    pub elapsed: Duration,
    pub start: PageRef,
    /// Location of the last page fetched
    pub last_location: Option<Url>,
    /// `static` or `dynamic`
    pub mode: &'static str,
}

impl ScrapeOutcome {
    /// Returns true if the catalog ended naturally or the cap was met
    pub fn is_complete(&self) -> bool {
        self.stop_reason.is_complete()
    }
}

/// State of one run of the page loop
struct LoopResult {
    items: Vec<ProductRecord>,
    stop_reason: StopReason,
    pages_visited: u32,
    last_location: Option<Url>,
}

/// Runs a scrape to completion
///
/// Configuration problems (invalid retry policy or page guard) and a browser
/// session that cannot be opened are reported as errors before any page is
/// fetched. Everything that happens once the loop runs ends up in the
/// returned `ScrapeOutcome`.
///
/// # Arguments
///
/// * `request` - Start page, fetch mode and limits
/// * `extractor` - Turns fetched pages into product records
/// * `cancel` - Stops the scrape when cancelled; partial results are kept
///
/// # Returns
///
/// * `Ok(ScrapeOutcome)` - The scrape ran and stopped for the given reason
/// * `Err(ScrapeError)` - The scrape could not start
pub async fn run_scrape(
    request: ScrapeRequest,
    extractor: &dyn ItemExtractor,
    cancel: CancellationToken,
) -> Result<ScrapeOutcome, ScrapeError> {
    let ScrapeRequest {
        start,
        mode,
        max_products,
        retry_policy,
        guard,
        mut rotator,
    } = request;

    guard.validate()?;
    let scheduler = RetryScheduler::new(retry_policy, cancel.clone())?;
    let strategy = PaginationStrategy::new(mode.variant());
    let label = mode.label();
    let started = Instant::now();

    tracing::info!(
        "Starting {} scrape at {} (max products: {}, max pages: {})",
        label,
        start,
        if max_products == 0 {
            "unlimited".to_string()
        } else {
            max_products.to_string()
        },
        guard.max_pages
    );

    let page_loop = PageLoop {
        scheduler: &scheduler,
        strategy,
        guard,
        max_products,
        extractor,
    };

    let result = match mode {
        FetchMode::Static(fetcher) => {
            page_loop
                .run(fetcher.as_ref(), &mut rotator, start.clone())
                .await
        }
        FetchMode::Dynamic(driver) => {
            let session = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                opened = driver.open() => Some(opened?),
            };

            match session {
                Some(session) => {
                    let session_guard = SessionGuard::new(session);
                    let result = {
                        let fetcher = BrowserFetcher::new(session_guard.session());
                        page_loop.run(&fetcher, &mut rotator, start.clone()).await
                    };
                    session_guard.close().await;
                    result
                }
                None => LoopResult {
                    items: Vec::new(),
                    stop_reason: StopReason::Cancelled,
                    pages_visited: 0,
                    last_location: None,
                },
            }
        }
    };

    let elapsed = started.elapsed();
    tracing::info!(
        "Scrape stopped: {} ({} items from {} pages in {:.1}s)",
        result.stop_reason,
        result.items.len(),
        result.pages_visited,
        elapsed.as_secs_f64()
    );

    Ok(ScrapeOutcome {
        items: result.items,
        stop_reason: result.stop_reason,
        pages_visited: result.pages_visited,
        elapsed,
        start,
        last_location: result.last_location,
        mode: label,
    })
}

/// The fetch-extract-paginate loop, independent of the fetch mode
struct PageLoop<'a> {
    scheduler: &'a RetryScheduler,
    strategy: PaginationStrategy,
    guard: PaginationGuard,
    max_products: usize,
    extractor: &'a dyn ItemExtractor,
}

impl PageLoop<'_> {
    async fn run(
        &self,
        fetcher: &dyn PageFetcher,
        rotator: &mut FingerprintRotator,
        start: PageRef,
    ) -> LoopResult {
        let mut state = PaginationState::new(start);
        let mut items: Vec<ProductRecord> = Vec::new();
        let mut last_location = None;

        let stop_reason = loop {
            let current = state.current().clone();
            let current_ref = &current;
            let rotator = &mut *rotator;

            let fetched = self
                .scheduler
                .execute(move |attempt| {
                    let fingerprint = rotator.next_fingerprint();
                    tracing::debug!("Fetching {} (attempt {})", current_ref, attempt);
                    async move {
                        let outcome = fetcher.fetch(current_ref, &fingerprint).await;
                        AttemptResult::new(outcome, fingerprint.delay_hint())
                    }
                })
                .await;

            let page = match fetched {
                Err(Cancelled) => {
                    tracing::info!("Scrape cancelled while fetching {}", current);
                    break StopReason::Cancelled;
                }
                Ok(FetchOutcome::Success(page)) => page,
                Ok(FetchOutcome::TransientFailure(reason))
                | Ok(FetchOutcome::PermanentFailure(reason)) => {
                    tracing::warn!("Giving up on {}: {}", current, reason);
                    break StopReason::FatalFetchFailure(reason);
                }
            };

            if state.is_repeat_landing(&page) {
                tracing::info!("{} led back to {}, treating as end", current, page.url);
                state.mark_exhausted();
                break StopReason::NoNextPage;
            }

            let mut extracted = self.extractor.extract(&page);
            let found = extracted.len();
            if self.max_products > 0 {
                extracted.truncate(self.max_products.saturating_sub(items.len()));
            }
            let kept = extracted.len();
            items.extend(extracted);
            state.record_page(&page, kept);
            last_location = Some(page.url.clone());

            tracing::info!(
                "Page {}: {} items found, {} kept, {} total",
                state.pages_visited(),
                found,
                kept,
                items.len()
            );

            if self.max_products > 0 && items.len() >= self.max_products {
                break StopReason::MaxProductsReached;
            }

            let Some(next) = self.strategy.next_page(&page, &state) else {
                state.mark_exhausted();
                break StopReason::NoNextPage;
            };

            if self.guard.is_tripped(state.pages_visited()) {
                tracing::warn!(
                    "Page guard of {} pages reached before {}",
                    self.guard.max_pages,
                    next
                );
                break StopReason::MaxPagesGuardTripped;
            }

            state.advance(next);
        };

        LoopResult {
            items,
            stop_reason,
            pages_visited: state.pages_visited(),
            last_location,
        }
    }
}

//! Browser sessions for dynamic scrapes
//!
//! A `BrowserDriver` opens a `BrowserSession`; the session performs page
//! actions (navigate, click next, set page) and reports each one as a
//! `FetchOutcome`. Sessions are scoped resources: `SessionGuard` closes the
//! session when the scrape ends, and from `Drop` if the scrape future is
//! dropped before that.

use crate::crawler::fetcher::{build_http_client, fetch_with_fingerprint, PageFetcher};
use crate::config::HttpConfig;
use crate::fingerprint::Fingerprint;
use crate::state::{FailureReason, FetchOutcome, PageAction, PageRef};
use crate::url::{find_page_number, with_page_number, with_page_param, PageNumberLocation};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use url::Url;

/// A browser session could not be opened
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to launch browser session: {0}")]
    Launch(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Opens browser sessions
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn BrowserSession>, SessionError>;
}

/// One open browser session
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Performs an action and returns the resulting page
    async fn perform(&self, action: &PageAction, fingerprint: &Fingerprint) -> FetchOutcome;

    /// Releases the session; further actions fail with `SessionClosed`
    async fn close(&self);
}

/// Owns a session and guarantees it is closed
pub struct SessionGuard {
    session: Arc<dyn BrowserSession>,
    closed: bool,
}

impl SessionGuard {
    pub fn new(session: Arc<dyn BrowserSession>) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    pub fn session(&self) -> &dyn BrowserSession {
        self.session.as_ref()
    }

    /// Closes the session
    pub async fn close(mut self) {
        self.closed = true;
        self.session.close().await;
        tracing::debug!("Browser session closed");
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let session = Arc::clone(&self.session);
                handle.spawn(async move {
                    session.close().await;
                    tracing::debug!("Browser session closed after the scrape was dropped");
                });
            }
            Err(_) => {
                tracing::warn!("Browser session dropped outside a runtime and was not closed");
            }
        }
    }
}

/// Adapts a browser session to the `PageFetcher` interface
///
/// URL references become `Navigate` actions.
pub struct BrowserFetcher<'a> {
    session: &'a dyn BrowserSession,
}

impl<'a> BrowserFetcher<'a> {
    pub fn new(session: &'a dyn BrowserSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher<'_> {
    async fn fetch(&self, page: &PageRef, fingerprint: &Fingerprint) -> FetchOutcome {
        match page {
            PageRef::Url(url) => {
                self.session
                    .perform(&PageAction::Navigate(url.clone()), fingerprint)
                    .await
            }
            PageRef::Action(action) => self.session.perform(action, fingerprint).await,
        }
    }
}

/// Driver for sessions that emulate a browser over plain HTTP
///
/// Suitable for sites whose catalog pages are server-rendered or embed
/// their data (such as `__NEXT_DATA__`). Pages that need script execution
/// need a real browser driver plugged in through `BrowserDriver`.
pub struct HttpBrowserDriver {
    config: HttpConfig,
}

impl HttpBrowserDriver {
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserDriver for HttpBrowserDriver {
    async fn open(&self) -> Result<Arc<dyn BrowserSession>, SessionError> {
        let client = build_http_client(&self.config)?;
        tracing::debug!("Opened HTTP browser session");
        Ok(Arc::new(HttpBrowserSession::new(client)))
    }
}

/// A session that tracks a current location and turns actions into requests
pub struct HttpBrowserSession {
    client: Client,
    location: Mutex<Option<Url>>,
    closed: AtomicBool,
}

impl HttpBrowserSession {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            location: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// The location of the last page shown
    pub fn location(&self) -> Option<Url> {
        self.location.lock().ok().and_then(|guard| guard.clone())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn set_location(&self, url: Url) {
        if let Ok(mut guard) = self.location.lock() {
            *guard = Some(url);
        }
    }

    /// Resolves an action to the address to load
    fn resolve(&self, action: &PageAction) -> Result<Url, FailureReason> {
        match action {
            PageAction::Navigate(url) => Ok(url.clone()),
            PageAction::ClickNext {
                target: Some(target),
                ..
            } => Ok(target.clone()),
            PageAction::ClickNext { selector, .. } => Err(FailureReason::malformed(format!(
                "control '{}' has no target to follow without script execution",
                selector
            ))),
            PageAction::SetPage { param, page } => {
                let current = self.location().ok_or_else(|| {
                    FailureReason::malformed("cannot set page before any navigation")
                })?;
                Ok(set_page(&current, param, *page))
            }
        }
    }
}

/// Rewrites the page number of `current`, or adds `param` if it has none
fn set_page(current: &Url, param: &str, page: u32) -> Url {
    match find_page_number(current) {
        Some(found)
            if matches!(&found.location, PageNumberLocation::Query(name) if name == param)
                || matches!(found.location, PageNumberLocation::Segment { .. }) =>
        {
            with_page_number(current, &found, page)
        }
        _ => with_page_param(current, param, page),
    }
}

#[async_trait]
impl BrowserSession for HttpBrowserSession {
    async fn perform(&self, action: &PageAction, fingerprint: &Fingerprint) -> FetchOutcome {
        if self.is_closed() {
            return FetchOutcome::PermanentFailure(FailureReason::SessionClosed);
        }

        let url = match self.resolve(action) {
            Ok(url) => url,
            Err(reason) => return FetchOutcome::PermanentFailure(reason),
        };

        tracing::debug!("Session action: {} ({})", action, url);
        let outcome = fetch_with_fingerprint(&self.client, &url, fingerprint).await;
        if let FetchOutcome::Success(page) = &outcome {
            self.set_location(page.url.clone());
        }
        outcome
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

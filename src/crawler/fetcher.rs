//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for static scrapes, including:
//! - Building the HTTP client from configuration
//! - Sending fingerprint headers with every request
//! - Robots.txt checks
//! - Classifying responses and errors into fetch outcomes
//! - Detecting rate-limit and challenge pages served with HTTP 200

use crate::config::HttpConfig;
use crate::crawler::parser::extract_title;
use crate::fingerprint::Fingerprint;
use crate::robots::{self, RobotsCache};
use crate::state::{FailureReason, FetchOutcome, PageRef, RawPage};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{redirect::Policy, Client, StatusCode};
use scraper::Html;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// Number of body bytes inspected for block indicators
const BLOCK_SCAN_BYTES: usize = 4096;

/// Phrases of rate-limit pages served with a success status
const RATE_LIMIT_PHRASES: &[&str] = &[
    "rate limit",
    "too many requests",
    "slow down",
    "throttled",
    "temporarily blocked",
];

/// Phrases of anti-bot challenge pages
const CHALLENGE_PHRASES: &[&str] = &[
    "captcha",
    "recaptcha",
    "hcaptcha",
    "please verify",
    "security check",
    "robot verification",
    "prove you're human",
];

/// Content types that can never be a catalog page
const BINARY_CONTENT_TYPES: &[&str] = &[
    "image/",
    "audio/",
    "video/",
    "application/pdf",
    "application/octet-stream",
    "application/zip",
];

/// Performs one fetch attempt for a page reference
///
/// Implementations never retry; retries belong to the scheduler. Every
/// failure is reported through the returned outcome.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, page: &PageRef, fingerprint: &Fingerprint) -> FetchOutcome;
}

/// Builds an HTTP client with proper configuration
///
/// No user agent is set on the client; each request carries the headers of
/// its fingerprint.
///
/// # Arguments
///
/// * `config` - The `[http]` configuration section
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::limited(config.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Static page fetcher over HTTP
pub struct HttpFetcher {
    client: Client,
    robots: Option<Mutex<RobotsCache>>,
}

impl HttpFetcher {
    /// Creates a fetcher from the `[http]` configuration section
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config)?;
        Ok(Self::with_client(client, config.respect_robots_txt))
    }

    /// Creates a fetcher around an existing client
    pub fn with_client(client: Client, respect_robots_txt: bool) -> Self {
        Self {
            client,
            robots: respect_robots_txt.then(|| Mutex::new(RobotsCache::new())),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, page: &PageRef, fingerprint: &Fingerprint) -> FetchOutcome {
        let Some(url) = page.url() else {
            return FetchOutcome::PermanentFailure(FailureReason::malformed(format!(
                "static fetcher cannot perform '{}'",
                page
            )));
        };

        if let Some(cache) = &self.robots {
            let mut cache = cache.lock().await;
            if !robots::is_allowed(&mut cache, &self.client, url, fingerprint.identity()).await {
                tracing::info!("robots.txt disallows {}", url);
                return FetchOutcome::PermanentFailure(FailureReason::RobotsDenied);
            }
        }

        fetch_with_fingerprint(&self.client, url, fingerprint).await
    }
}

/// Sends one GET request with fingerprint headers and classifies the result
///
/// # Classification
///
/// | Condition | Outcome |
/// |-----------|---------|
/// | 2xx | Success, unless the body is a block page |
/// | 404 / 410 | Permanent `NotFound` |
/// | 429 | Transient `RateLimited`, with `Retry-After` |
/// | 408 / 5xx | Transient `ServerError` |
/// | Other status | Permanent `HttpStatus` |
/// | Timeout | Transient `Timeout` |
/// | Connection or body error | Transient `ConnectionReset` |
/// | Binary Content-Type | Permanent `Malformed` |
pub async fn fetch_with_fingerprint(
    client: &Client,
    url: &Url,
    fingerprint: &Fingerprint,
) -> FetchOutcome {
    let mut request = client.get(url.clone());
    for (name, value) in fingerprint.headers() {
        request = request.header(name, value);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => return FetchOutcome::failure(classify_error(&e)),
    };

    let status = response.status();
    let final_url = response.url().clone();
    tracing::trace!("GET {} -> {} ({})", url, status, final_url);

    if let Some(reason) = classify_status(status, response.headers()) {
        return FetchOutcome::failure(reason);
    }

    if let Some(content_type) = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    {
        if is_binary_content_type(content_type) {
            return FetchOutcome::PermanentFailure(FailureReason::malformed(format!(
                "unexpected content type '{}'",
                content_type
            )));
        }
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => return FetchOutcome::failure(classify_error(&e)),
    };

    if let Some(reason) = detect_block(&body) {
        return FetchOutcome::failure(reason);
    }

    FetchOutcome::Success(RawPage {
        url: final_url,
        status: status.as_u16(),
        body,
    })
}

/// Maps a non-success status to a failure reason
pub fn classify_status(status: StatusCode, headers: &HeaderMap) -> Option<FailureReason> {
    if status.is_success() {
        return None;
    }

    let code = status.as_u16();
    let reason = match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => FailureReason::NotFound { status: code },
        StatusCode::TOO_MANY_REQUESTS => FailureReason::RateLimited {
            retry_after: parse_retry_after(headers),
        },
        StatusCode::REQUEST_TIMEOUT => FailureReason::ServerError { status: code },
        s if s.is_server_error() => FailureReason::ServerError { status: code },
        _ => FailureReason::HttpStatus { status: code },
    };
    Some(reason)
}

/// Maps a request error to a failure reason
pub fn classify_error(error: &reqwest::Error) -> FailureReason {
    if error.is_timeout() {
        FailureReason::Timeout
    } else if error.is_redirect() {
        FailureReason::malformed(format!("redirect error: {}", error))
    } else if error.is_builder() {
        FailureReason::malformed(error.to_string())
    } else {
        FailureReason::ConnectionReset(error.to_string())
    }
}

/// Reads `Retry-After` as delta-seconds or an HTTP date
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let wait = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

/// Returns true for content types that cannot hold a catalog page
pub fn is_binary_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    BINARY_CONTENT_TYPES
        .iter()
        .any(|prefix| lower.trim_start().starts_with(prefix))
}

/// Looks for rate-limit or challenge pages in a successful body
///
/// Only the title and the start of the body are inspected, so product names
/// and descriptions further down do not trigger it.
pub fn detect_block(body: &str) -> Option<FailureReason> {
    let mut end = body.len().min(BLOCK_SCAN_BYTES);
    while !body.is_char_boundary(end) {
        end -= 1;
    }

    let title = extract_title(&Html::parse_document(body)).unwrap_or_default();
    let window = format!("{} {}", title, &body[..end]).to_lowercase();

    if let Some(phrase) = RATE_LIMIT_PHRASES.iter().find(|p| window.contains(*p)) {
        tracing::debug!("Rate-limit page detected ('{}')", phrase);
        return Some(FailureReason::RateLimited { retry_after: None });
    }

    CHALLENGE_PHRASES
        .iter()
        .find(|p| window.contains(*p))
        .map(|phrase| FailureReason::Blocked {
            indicator: phrase.to_string(),
        })
}

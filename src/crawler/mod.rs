//! Scrape engine
//!
//! This module contains the page loop and its collaborators:
//! - Retry scheduling with backoff and cancellation
//! - Static HTTP fetching and browser-session fetching
//! - Product extraction from fetched pages
//! - Overall scrape coordination

mod browser;
mod coordinator;
mod fetcher;
mod parser;
mod scheduler;

pub use browser::{
    BrowserDriver, BrowserFetcher, BrowserSession, HttpBrowserDriver, HttpBrowserSession,
    SessionError, SessionGuard,
};
pub use coordinator::{run_scrape, FetchMode, ScrapeOutcome, ScrapeRequest};
pub use fetcher::{
    build_http_client, classify_error, classify_status, detect_block, fetch_with_fingerprint,
    is_binary_content_type, parse_retry_after, HttpFetcher, PageFetcher,
};
pub use parser::{extract_title, CatalogTemplate, ItemExtractor, NextDataExtractor, ProductRecord};
pub use scheduler::{AttemptResult, Cancelled, RetryPolicy, RetryScheduler};

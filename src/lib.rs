//! Catalog-Ripple: a resilient catalog paginator
//!
//! This crate walks e-commerce catalog listings page by page, extracting product
//! records while rotating request fingerprints, retrying transient failures with
//! exponential backoff, and deciding when the catalog is exhausted.

pub mod config;
pub mod crawler;
pub mod fingerprint;
pub mod output;
pub mod pagination;
pub mod robots;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Catalog-Ripple operations
///
/// Fetch failures never show up here: they are folded into the
/// [`StopReason`] of a finished scrape. These errors only surface before
/// the page loop starts or after it has finished.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Browser session error: {0}")]
    Session(#[from] crawler::SessionError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Catalog-Ripple operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{
    run_scrape, FetchMode, ItemExtractor, PageFetcher, ProductRecord, RetryPolicy, ScrapeOutcome,
    ScrapeRequest,
};
pub use fingerprint::{Fingerprint, FingerprintRotator, RotationOrder};
pub use pagination::{PaginationGuard, PaginationStrategy, PaginationVariant};
pub use state::{FailureReason, FetchOutcome, PageAction, PageRef, PaginationState, RawPage, StopReason};

use crate::crawler::RetryPolicy;
use crate::fingerprint::{default_accept_languages, default_user_agents, RotationOrder};
use crate::output::OutputFormat;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Catalog-Ripple
///
/// Every section is optional; missing sections and keys take the defaults
/// below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scrape: ScrapeConfig,
    pub retry: RetryConfig,
    pub fingerprints: FingerprintConfig,
    pub http: HttpConfig,
    pub extract: ExtractConfig,
    pub output: OutputConfig,
}

/// Which fetch modes to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeMode {
    #[default]
    Static,
    Dynamic,
    /// Static first, then dynamic, each with half the product budget
    Both,
}

/// What to scrape and when to stop
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScrapeConfig {
    /// First catalog page
    pub start_url: String,

    pub mode: ScrapeMode,

    /// Product cap; 0 means unlimited
    pub max_products: usize,

    /// Hard limit on pages visited per scrape
    pub max_pages: u32,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            start_url: "https://books.toscrape.com/".to_string(),
            mode: ScrapeMode::Static,
            max_products: 50,
            max_pages: 100,
        }
    }
}

/// Retry policy for a single page fetch
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Total attempts per page, including the first
    pub max_attempts: u32,

    /// Backoff after the first failure (milliseconds)
    pub base_delay_ms: u64,

    /// Cap on the computed backoff (milliseconds)
    pub max_delay_ms: u64,

    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 30_000,
            backoff_multiplier: 1.5,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

/// Request identities
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FingerprintConfig {
    /// Rotate identities; when false only the first user agent is used
    pub enabled: bool,

    pub rotation: RotationOrder,

    pub user_agents: Vec<String>,

    pub accept_languages: Vec<String>,

    /// Extra wait added to every retry backoff (milliseconds)
    pub delay_hint_ms: u64,

    /// Random extra of up to this much per drawn fingerprint (milliseconds)
    pub jitter_ms: u64,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rotation: RotationOrder::Random,
            user_agents: default_user_agents(),
            accept_languages: default_accept_languages(),
            delay_hint_ms: 1500,
            jitter_ms: 1000,
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_redirects: usize,
    pub respect_robots_txt: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            connect_timeout_secs: 10,
            max_redirects: 5,
            respect_robots_txt: true,
        }
    }
}

/// Which extractor reads product records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractTemplate {
    /// CSS selectors over server-rendered listings
    #[default]
    Catalog,

    /// `script#__NEXT_DATA__` JSON
    NextData,
}

/// Item extraction settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExtractConfig {
    pub template: ExtractTemplate,

    pub selectors: SelectorConfig,

    /// Base for product URLs built from slugs (next-data template)
    pub product_base_url: Option<String>,
}

/// CSS selectors of the catalog template
///
/// Defaults match books.toscrape-style listings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SelectorConfig {
    /// One element per product
    pub item: String,

    pub name: String,

    /// Attribute holding the full name; element text when unset
    pub name_attr: Option<String>,

    pub price: String,
    pub availability: Option<String>,
    pub image: Option<String>,
    pub link: Option<String>,

    /// Element whose class carries the rating word
    pub rating: Option<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            item: "article.product_pod".to_string(),
            name: "h3 a".to_string(),
            name_attr: Some("title".to_string()),
            price: "p.price_color".to_string(),
            availability: Some("p.availability".to_string()),
            image: Some("img".to_string()),
            link: Some("h3 a".to_string()),
            rating: Some("p.star-rating".to_string()),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory receiving the product files
    pub directory: String,

    pub format: OutputFormat,

    /// Path of the markdown run report; none when unset
    pub summary_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "output".to_string(),
            format: OutputFormat::Json,
            summary_path: None,
        }
    }
}

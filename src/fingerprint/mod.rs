//! Request fingerprints and their rotation
//!
//! A `Fingerprint` is the identity a single fetch attempt presents to the
//! site: user agent, accept-language, optional client hints and a delay hint
//! the retry scheduler adds to its backoff. The `FingerprintRotator` hands
//! them out so that two consecutive attempts never share an identity.

mod pool;

pub use pool::{
    default_accept_languages, default_user_agents, ACCEPT_DOCUMENT, DEFAULT_ACCEPT_LANGUAGES,
    DEFAULT_USER_AGENTS,
};

use crate::config::FingerprintConfig;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// `Sec-CH-UA*` headers sent by Chromium-family browsers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHints {
    pub brands: String,
    pub mobile: bool,
    pub platform: String,
}

impl ClientHints {
    /// Derives client hints from a user agent
    ///
    /// Returns `None` for browsers that do not send them (Firefox, Safari).
    pub fn from_user_agent(user_agent: &str) -> Option<Self> {
        let chrome_major = version_after(user_agent, "Chrome/")?;

        let brands = match version_after(user_agent, "Edg/") {
            Some(edge_major) => format!(
                "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"{}\", \"Microsoft Edge\";v=\"{}\"",
                chrome_major, edge_major
            ),
            None => format!(
                "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"{0}\", \"Google Chrome\";v=\"{0}\"",
                chrome_major
            ),
        };

        let platform = if user_agent.contains("Windows") {
            "Windows"
        } else if user_agent.contains("Macintosh") || user_agent.contains("Mac OS X") {
            "macOS"
        } else if user_agent.contains("Android") {
            "Android"
        } else if user_agent.contains("Linux") || user_agent.contains("X11") {
            "Linux"
        } else {
            "Unknown"
        };

        Some(Self {
            brands,
            mobile: user_agent.contains("Mobile"),
            platform: platform.to_string(),
        })
    }
}

/// Major version number following `marker` in a user agent
fn version_after(user_agent: &str, marker: &str) -> Option<u32> {
    let start = user_agent.find(marker)? + marker.len();
    let digits: String = user_agent[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// The identity presented by one fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    identity: String,
    accept_language: String,
    client_hints: Option<ClientHints>,
    delay_hint: Duration,
}

impl Fingerprint {
    /// Creates a fingerprint for a user agent
    ///
    /// Client hints are derived from the user agent; the accept-language
    /// defaults to the first entry of the default pool.
    pub fn new(identity: impl Into<String>, delay_hint: Duration) -> Self {
        let identity = identity.into();
        let client_hints = ClientHints::from_user_agent(&identity);
        Self {
            identity,
            accept_language: DEFAULT_ACCEPT_LANGUAGES[0].to_string(),
            client_hints,
            delay_hint,
        }
    }

    /// Sets the accept-language
    pub fn with_accept_language(mut self, accept_language: impl Into<String>) -> Self {
        self.accept_language = accept_language.into();
        self
    }

    /// The user agent string
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn accept_language(&self) -> &str {
        &self.accept_language
    }

    pub fn client_hints(&self) -> Option<&ClientHints> {
        self.client_hints.as_ref()
    }

    /// Extra wait the scheduler adds before retrying with this fingerprint
    pub fn delay_hint(&self) -> Duration {
        self.delay_hint
    }

    /// Renders the browser-like request headers for this identity
    ///
    /// `Accept-Encoding` is left to the HTTP client, which only advertises
    /// the encodings it can decode.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("User-Agent", self.identity.clone()),
            ("Accept", ACCEPT_DOCUMENT.to_string()),
            ("Accept-Language", self.accept_language.clone()),
            ("DNT", "1".to_string()),
            ("Upgrade-Insecure-Requests", "1".to_string()),
            ("Sec-Fetch-Dest", "document".to_string()),
            ("Sec-Fetch-Mode", "navigate".to_string()),
            ("Sec-Fetch-Site", "none".to_string()),
            ("Sec-Fetch-User", "?1".to_string()),
            ("Cache-Control", "max-age=0".to_string()),
        ];

        if let Some(hints) = &self.client_hints {
            headers.push(("Sec-CH-UA", hints.brands.clone()));
            headers.push((
                "Sec-CH-UA-Mobile",
                if hints.mobile { "?1" } else { "?0" }.to_string(),
            ));
            headers.push(("Sec-CH-UA-Platform", format!("\"{}\"", hints.platform)));
        }

        headers
    }
}

/// How the rotator walks its pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RotationOrder {
    /// Cycle through the pool in order
    Sequential,

    /// Draw uniformly, never repeating the previous entry
    #[default]
    Random,
}

/// Hands out fingerprints from a fixed pool
#[derive(Debug)]
pub struct FingerprintRotator {
    pool: Vec<Fingerprint>,
    order: RotationOrder,
    cursor: usize,
    last: Option<usize>,
    jitter: Duration,
    rng: fastrand::Rng,
}

impl FingerprintRotator {
    /// Creates a rotator over `pool`
    ///
    /// Entries sharing an identity are collapsed to the first one, so the
    /// no-consecutive-repeat guarantee holds for identities and not just
    /// pool slots.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the pool is empty.
    pub fn new(pool: Vec<Fingerprint>, order: RotationOrder) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let original_len = pool.len();
        let pool: Vec<Fingerprint> = pool
            .into_iter()
            .filter(|fp| seen.insert(fp.identity.clone()))
            .collect();

        if pool.is_empty() {
            return Err(ConfigError::Validation(
                "Fingerprint pool must contain at least one identity".to_string(),
            ));
        }

        if pool.len() < original_len {
            tracing::warn!(
                "Dropped {} duplicate identities from fingerprint pool",
                original_len - pool.len()
            );
        }

        Ok(Self {
            pool,
            order,
            cursor: 0,
            last: None,
            jitter: Duration::ZERO,
            rng: fastrand::Rng::new(),
        })
    }

    /// Builds a rotator from the `[fingerprints]` configuration section
    ///
    /// Blank user agents are skipped. With rotation disabled the pool holds
    /// only the first remaining user agent.
    pub fn from_config(config: &FingerprintConfig) -> Result<Self, ConfigError> {
        let delay_hint = Duration::from_millis(config.delay_hint_ms);
        let languages = if config.accept_languages.is_empty() {
            default_accept_languages()
        } else {
            config.accept_languages.clone()
        };

        let take = if config.enabled {
            config.user_agents.len()
        } else {
            1
        };

        let pool = config
            .user_agents
            .iter()
            .map(|ua| ua.trim())
            .filter(|ua| !ua.is_empty())
            .take(take)
            .enumerate()
            .map(|(i, ua)| {
                Fingerprint::new(ua.to_string(), delay_hint)
                    .with_accept_language(languages[i % languages.len()].clone())
            })
            .collect();

        Ok(Self::new(pool, config.rotation)?.with_jitter(Duration::from_millis(config.jitter_ms)))
    }

    /// Seeds the random source, for reproducible draws
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    /// Adds a random extra of up to `jitter` to each drawn delay hint
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Number of distinct identities in the pool
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Draws the next fingerprint
    pub fn next_fingerprint(&mut self) -> Fingerprint {
        let len = self.pool.len();
        let index = match self.order {
            RotationOrder::Sequential => {
                let index = self.cursor % len;
                self.cursor = (index + 1) % len;
                index
            }
            RotationOrder::Random => match self.last {
                Some(last) if len > 1 => {
                    // Draw from the other len-1 slots
                    let pick = self.rng.usize(0..len - 1);
                    if pick >= last {
                        pick + 1
                    } else {
                        pick
                    }
                }
                _ => self.rng.usize(0..len),
            },
        };
        self.last = Some(index);

        let mut fingerprint = self.pool[index].clone();
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms > 0 {
            fingerprint.delay_hint += Duration::from_millis(self.rng.u64(0..=jitter_ms));
        }

        tracing::trace!("Drew fingerprint #{}: {}", index, fingerprint.identity);
        fingerprint
    }
}

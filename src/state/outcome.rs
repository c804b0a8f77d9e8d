//! Fetch outcome classification
//!
//! Every fetch attempt ends in exactly one `FetchOutcome`. The variant decides
//! what the retry scheduler does next: success and permanent failures are
//! returned immediately, transient failures are retried with backoff.

use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A fetched catalog page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// Final location after redirects or browser navigation
    pub url: Url,

    /// HTTP status code of the response
    pub status: u16,

    /// Page markup
    pub body: String,
}

impl RawPage {
    /// Creates a page with status 200
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            url,
            status: 200,
            body: body.into(),
        }
    }
}

/// Result of a single fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The page was fetched
    Success(RawPage),

    /// The attempt failed, but a later attempt could plausibly succeed
    TransientFailure(FailureReason),

    /// The attempt failed and retrying would not help
    PermanentFailure(FailureReason),
}

impl FetchOutcome {
    /// Returns true for `Success`
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns true for `TransientFailure`
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFailure(_))
    }

    /// Returns true for `PermanentFailure`
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::PermanentFailure(_))
    }

    /// Returns the failure reason, if this outcome is a failure
    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            Self::Success(_) => None,
            Self::TransientFailure(reason) | Self::PermanentFailure(reason) => Some(reason),
        }
    }

    /// Builds a failure outcome, choosing the variant from the reason
    pub fn failure(reason: FailureReason) -> Self {
        if reason.is_transient() {
            Self::TransientFailure(reason)
        } else {
            Self::PermanentFailure(reason)
        }
    }
}

/// Why a fetch attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    // ===== Transient =====
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionReset(String),

    #[error("rate limited")]
    RateLimited {
        /// Server-requested wait, from `Retry-After`
        retry_after: Option<Duration>,
    },

    #[error("server error (HTTP {status})")]
    ServerError { status: u16 },

    #[error("blocked by anti-bot challenge ({indicator})")]
    Blocked { indicator: String },

    // ===== Permanent =====
    #[error("page not found (HTTP {status})")]
    NotFound { status: u16 },

    #[error("unexpected HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("malformed response: {message}")]
    Malformed { message: String },

    #[error("disallowed by robots.txt")]
    RobotsDenied,

    #[error("browser session is closed")]
    SessionClosed,
}

impl FailureReason {
    /// Returns true if retrying could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::ConnectionReset(_)
                | Self::RateLimited { .. }
                | Self::ServerError { .. }
                | Self::Blocked { .. }
        )
    }

    /// Returns the server-requested wait for rate-limit failures
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Shorthand for a malformed-response failure
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

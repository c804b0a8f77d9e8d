//! Page locators for static and browser-driven scrapes
//!
//! A `PageRef` is produced by the pagination strategy and consumed by a fetcher.
//! Static fetchers only understand URLs; browser sessions also understand actions.

use crate::url::canonical_key;
use std::fmt;
use url::Url;

/// Locates a single catalog page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageRef {
    /// A directly fetchable page address
    Url(Url),

    /// An action to perform inside a browser session
    Action(PageAction),
}

/// An action a browser session performs to reach a page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageAction {
    /// Load the given address in the session
    Navigate(Url),

    /// Activate the "next page" control and wait for the content to be replaced
    ClickNext {
        /// CSS selector of the control
        selector: String,

        /// Where the control leads, when the markup says so
        target: Option<Url>,

        /// 1-based position of the page this click is expected to reach
        ordinal: u32,
    },

    /// Set the page parameter of the current location
    SetPage {
        /// Name of the query parameter (or `page` for path-encoded numbers)
        param: String,

        /// The page number to show
        page: u32,
    },
}

impl PageRef {
    /// Returns the address this reference resolves to, when it has one
    pub fn url(&self) -> Option<&Url> {
        match self {
            Self::Url(url) | Self::Action(PageAction::Navigate(url)) => Some(url),
            Self::Action(PageAction::ClickNext {
                target: Some(url), ..
            }) => Some(url),
            Self::Action(_) => None,
        }
    }

    /// Returns true if this reference is a browser action
    pub fn is_action(&self) -> bool {
        matches!(self, Self::Action(_))
    }

    /// Returns the key used to decide whether two references reach the same page
    ///
    /// References that resolve to an address compare by canonical URL, so a
    /// "click next" whose target is a page already fetched is recognised as a
    /// revisit. Actions without an address fall back to a structural key.
    pub fn visit_key(&self) -> String {
        match self {
            Self::Url(url)
            | Self::Action(PageAction::Navigate(url))
            | Self::Action(PageAction::ClickNext {
                target: Some(url), ..
            }) => canonical_key(url),
            Self::Action(PageAction::ClickNext {
                selector,
                target: None,
                ordinal,
            }) => format!("click:{}#{}", selector, ordinal),
            Self::Action(PageAction::SetPage { param, page }) => {
                format!("set:{}={}", param, page)
            }
        }
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{}", url),
            Self::Action(action) => write!(f, "{}", action),
        }
    }
}

impl fmt::Display for PageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Navigate(url) => write!(f, "navigate {}", url),
            Self::ClickNext {
                selector,
                target: Some(target),
                ..
            } => write!(f, "click {} -> {}", selector, target),
            Self::ClickNext {
                selector, ordinal, ..
            } => write!(f, "click {} (page {})", selector, ordinal),
            Self::SetPage { param, page } => write!(f, "set {}={}", param, page),
        }
    }
}

impl From<Url> for PageRef {
    fn from(url: Url) -> Self {
        Self::Url(url)
    }
}

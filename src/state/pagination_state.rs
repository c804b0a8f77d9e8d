//! Loop-owned pagination state and stop reasons
//!
//! `PaginationState` is created when a scrape starts, mutated once per loop
//! iteration by the coordinator, and dropped when the loop ends.

use crate::state::{FailureReason, PageRef, RawPage};
use crate::url::canonical_key;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

/// Why a scrape stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The configured product cap was reached
    MaxProductsReached,

    /// The last page had no usable next-page affordance, or it pointed back
    NoNextPage,

    /// The hard limit on pages visited was reached
    MaxPagesGuardTripped,

    /// A fetch failed permanently, or kept failing transiently past the retry budget
    FatalFetchFailure(FailureReason),

    /// The caller cancelled the scrape
    Cancelled,
}

impl StopReason {
    /// Returns true if the catalog ended naturally or the requested cap was met
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::MaxProductsReached | Self::NoNextPage)
    }

    /// Short machine-friendly label
    pub fn label(&self) -> &'static str {
        match self {
            Self::MaxProductsReached => "max_products_reached",
            Self::NoNextPage => "no_next_page",
            Self::MaxPagesGuardTripped => "max_pages_guard_tripped",
            Self::FatalFetchFailure(_) => "fatal_fetch_failure",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxProductsReached => write!(f, "product cap reached"),
            Self::NoNextPage => write!(f, "no next page"),
            Self::MaxPagesGuardTripped => write!(f, "page guard tripped"),
            Self::FatalFetchFailure(reason) => write!(f, "fatal fetch failure: {}", reason),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Progress of a single scrape
///
/// Counters only move forward and `exhausted` is terminal; the fields are
/// private so those rules hold for every caller.
#[derive(Debug, Clone)]
pub struct PaginationState {
    current: PageRef,
    pages_visited: u32,
    items_collected: usize,
    exhausted: bool,
    visited: HashSet<String>,

    /// Location plus content digest of every fetched page
    landings: HashSet<String>,
}

impl PaginationState {
    /// Creates the state for a scrape starting at `start`
    pub fn new(start: PageRef) -> Self {
        let mut visited = HashSet::new();
        visited.insert(start.visit_key());

        Self {
            current: start,
            pages_visited: 0,
            items_collected: 0,
            exhausted: false,
            visited,
            landings: HashSet::new(),
        }
    }

    /// The page being fetched (or last fetched, once stopped)
    pub fn current(&self) -> &PageRef {
        &self.current
    }

    /// Number of pages fetched successfully
    pub fn pages_visited(&self) -> u32 {
        self.pages_visited
    }

    /// Number of items kept so far
    pub fn items_collected(&self) -> usize {
        self.items_collected
    }

    /// Returns true once no further pages are reachable
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Returns true if `candidate` designates a page that was already reached
    pub fn has_visited(&self, candidate: &PageRef) -> bool {
        self.visited.contains(&candidate.visit_key())
    }

    /// Returns true if `page` repeats an earlier page and the current reference cannot tell
    ///
    /// Only references without an address (a click on a control with no
    /// target, a page-number change) are judged by where they landed. A landing counts as a repeat
    /// when both its location and its markup match a page already recorded.
    pub fn is_repeat_landing(&self, page: &RawPage) -> bool {
        self.current.url().is_none() && self.landings.contains(&landing_key(page))
    }

    /// Records a fetched page and the number of items kept from it
    ///
    /// The page's final location is remembered alongside the reference that
    /// produced it, so a later link back to either counts as a revisit.
    pub fn record_page(&mut self, page: &RawPage, items_kept: usize) {
        self.pages_visited = self.pages_visited.saturating_add(1);
        self.items_collected = self.items_collected.saturating_add(items_kept);
        self.visited.insert(self.current.visit_key());
        self.visited.insert(canonical_key(&page.url));
        self.landings.insert(landing_key(page));
    }

    /// Moves to the next page
    ///
    /// Ignored once the state is exhausted.
    pub fn advance(&mut self, next: PageRef) {
        if self.exhausted {
            tracing::warn!("Ignoring advance to {} after exhaustion", next);
            return;
        }
        self.visited.insert(next.visit_key());
        self.current = next;
    }

    /// Marks the catalog as exhausted
    pub fn mark_exhausted(&mut self) {
        self.exhausted = true;
    }
}

fn landing_key(page: &RawPage) -> String {
    let digest = Sha256::digest(page.body.as_bytes());
    format!("{}#{}", canonical_key(&page.url), hex::encode(digest))
}

//! Pagination strategy
//!
//! Decides how to get from one catalog page to the next, or that there is no
//! next page. The decision is the same for every fetch mode:
//!
//! 1. A usable "next" control (explicit next link, numbered pagination
//!    link, load-more control) wins.
//! 2. Otherwise, if the current location carries a page number and the page
//!    declares a last page above it, the number is incremented.
//! 3. Otherwise the catalog is exhausted.
//!
//! A candidate that designates an already visited page is a cycle and also
//! ends the catalog. The variants differ only in the `PageRef` they produce:
//! URLs for static fetching, browser actions for dynamic fetching.

mod detect;

pub use detect::{find_last_page, find_next_link, parse_page_of, resolve_target, NextLink, NextRule};

use crate::state::{PageAction, PageRef, PaginationState, RawPage};
use crate::url::{find_page_number, with_page_number, PageNumber, PageNumberLocation};
use crate::ConfigError;
use scraper::Html;
use url::Url;

/// How next-page references are materialised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationVariant {
    /// Produce fetchable URLs
    UrlRewrite,

    /// Produce browser actions
    ActionDescriptor,
}

/// Hard limit on the number of pages one scrape visits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationGuard {
    pub max_pages: u32,
}

impl Default for PaginationGuard {
    fn default() -> Self {
        Self { max_pages: 100 }
    }
}

impl PaginationGuard {
    pub fn new(max_pages: u32) -> Self {
        Self { max_pages }
    }

    /// Returns true once `pages_visited` reaches the limit
    pub fn is_tripped(&self, pages_visited: u32) -> bool {
        pages_visited >= self.max_pages
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pages < 1 {
            return Err(ConfigError::Validation(
                "max-pages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A next-page decision before it is turned into a `PageRef`
#[derive(Debug)]
enum Candidate {
    Link(NextLink),
    Increment {
        location: Url,
        found: PageNumber,
        next: u32,
    },
}

/// Finds the next catalog page
#[derive(Debug, Clone, Copy)]
pub struct PaginationStrategy {
    variant: PaginationVariant,
}

impl PaginationStrategy {
    pub fn new(variant: PaginationVariant) -> Self {
        Self { variant }
    }

    /// Returns the reference to the page after `page`, or `None` when the catalog is exhausted
    ///
    /// # Arguments
    ///
    /// * `page` - The page just fetched
    /// * `state` - Loop state, for the current reference and the visited set
    pub fn next_page(&self, page: &RawPage, state: &PaginationState) -> Option<PageRef> {
        let document = Html::parse_document(&page.body);
        let current_number = current_page_number(page, state.current());
        let current_index = current_number.as_ref().map_or(1, |(_, n)| n.value);
        let require_target = self.variant == PaginationVariant::UrlRewrite;

        let candidate = match find_next_link(&document, &page.url, current_index, require_target)
        {
            Some(link) => {
                tracing::debug!(
                    "Next page via {:?} '{}' on {}",
                    link.rule,
                    link.selector,
                    page.url
                );
                Candidate::Link(link)
            }
            None => {
                let (location, found) = current_number?;
                let last_page = find_last_page(&document)?;
                if found.value >= last_page {
                    tracing::debug!("Page {} of {} is the last page", found.value, last_page);
                    return None;
                }
                tracing::debug!(
                    "Next page by incrementing page {} of {}",
                    found.value,
                    last_page
                );
                let next = found.value + 1;
                Candidate::Increment {
                    location,
                    found,
                    next,
                }
            }
        };

        let next_ref = self.materialise(candidate, state)?;

        if state.has_visited(&next_ref) {
            tracing::debug!("Next page {} was already visited, treating as end", next_ref);
            return None;
        }

        Some(next_ref)
    }

    fn materialise(&self, candidate: Candidate, state: &PaginationState) -> Option<PageRef> {
        match (self.variant, candidate) {
            (PaginationVariant::UrlRewrite, Candidate::Link(link)) => link.target.map(PageRef::Url),
            (
                PaginationVariant::UrlRewrite,
                Candidate::Increment {
                    location,
                    found,
                    next,
                },
            ) => Some(PageRef::Url(with_page_number(&location, &found, next))),
            (PaginationVariant::ActionDescriptor, Candidate::Link(link)) => {
                if link.clickable {
                    Some(PageRef::Action(PageAction::ClickNext {
                        selector: link.selector,
                        target: link.target,
                        ordinal: state.pages_visited().saturating_add(1),
                    }))
                } else {
                    link.target.map(|url| PageRef::Action(PageAction::Navigate(url)))
                }
            }
            (PaginationVariant::ActionDescriptor, Candidate::Increment { found, next, .. }) => {
                Some(PageRef::Action(PageAction::SetPage {
                    param: found.param_name().to_string(),
                    page: next,
                }))
            }
        }
    }
}

/// Locates the page number of the page just fetched
///
/// The fetched location is checked first, then the reference that was
/// requested. A `SetPage` action without a number in the location still
/// tells which page is showing.
fn current_page_number(page: &RawPage, current: &PageRef) -> Option<(Url, PageNumber)> {
    if let Some(found) = find_page_number(&page.url) {
        return Some((page.url.clone(), found));
    }

    if let Some(url) = current.url() {
        if let Some(found) = find_page_number(url) {
            return Some((url.clone(), found));
        }
    }

    match current {
        PageRef::Action(PageAction::SetPage { param, page: value }) => Some((
            page.url.clone(),
            PageNumber {
                value: *value,
                location: PageNumberLocation::Query(param.clone()),
            },
        )),
        _ => None,
    }
}

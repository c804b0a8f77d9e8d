//! State module for tracking scrape progress
//!
//! This module holds the data model shared by every component of the page loop.
//!
//! # Components
//!
//! - `PageRef`: Locates a catalog page, either by URL or by browser action
//! - `FetchOutcome`: The classified result of a single fetch attempt
//! - `PaginationState`: Loop-owned progress (current page, visited pages, counters)
//! - `StopReason`: Why a scrape ended

mod outcome;
mod page_ref;
mod pagination_state;

// Re-export main types
pub use outcome::{FailureReason, FetchOutcome, RawPage};
pub use page_ref::{PageAction, PageRef};
pub use pagination_state::{PaginationState, StopReason};

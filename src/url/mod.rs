//! URL handling module for Catalog-Ripple
//!
//! This module provides start URL validation, canonical page keys for
//! revisit detection, origin extraction for robots rules, and page-number
//! rewriting for URL-driven pagination.

mod normalize;
mod origin;
mod page_number;

// Re-export main functions
pub use normalize::{canonical_key, parse_start_url};
pub use origin::extract_origin;
pub use page_number::{
    find_page_number, with_page_number, with_page_param, PageNumber, PageNumberLocation,
};

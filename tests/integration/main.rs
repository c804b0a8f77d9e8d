//! Integration tests for Catalog-Ripple
//!
//! - `scrape_tests`: the page loop against scripted fetchers and sessions
//! - `http_tests`: full static and dynamic runs against wiremock servers

mod common;
mod http_tests;
mod scrape_tests;

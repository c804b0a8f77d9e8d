//! Robots.txt handling module
//!
//! Fetches, parses and caches robots.txt per origin so the static fetcher
//! can skip pages the site asks robots not to load.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::ParsedRobots;

use crate::url::extract_origin;
use reqwest::Client;
use url::Url;

/// Fetches robots.txt for an origin
///
/// Any failure (network error, non-success status, unreadable body) yields
/// allow-all rules.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `origin` - The origin, e.g. `https://books.toscrape.com`
/// * `user_agent` - The user agent to send
pub async fn fetch_robots(client: &Client, origin: &str, user_agent: &str) -> ParsedRobots {
    let robots_url = format!("{}/robots.txt", origin);

    let response = match client
        .get(&robots_url)
        .header("User-Agent", user_agent)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("Could not fetch {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    if !response.status().is_success() {
        tracing::debug!("{} returned HTTP {}", robots_url, response.status());
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(e) => {
            tracing::debug!("Could not read {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}

/// Checks `url` against robots.txt, fetching and caching the rules as needed
///
/// # Returns
///
/// * `true` - If the URL may be fetched
/// * `false` - If robots.txt disallows it
pub async fn is_allowed(cache: &mut RobotsCache, client: &Client, url: &Url, user_agent: &str) -> bool {
    let Some(origin) = extract_origin(url) else {
        return true;
    };

    if let Some(robots) = cache.get_fresh(&origin) {
        return robots.is_allowed(url, user_agent);
    }

    let robots = fetch_robots(client, &origin, user_agent).await;
    let allowed = robots.is_allowed(url, user_agent);
    tracing::debug!(
        "Loaded robots.txt for {} ({})",
        origin,
        if robots.is_allow_all() { "allow all" } else { "rules" }
    );
    cache.insert(origin, robots);
    allowed
}

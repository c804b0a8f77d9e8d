//! Robots.txt rule matching
//!
//! Wraps the `robotstxt` crate's matcher. Rules are matched against the full
//! page URL and the user agent the request actually presents.

use robotstxt::DefaultMatcher;
use url::Url;

/// Robots.txt rules for one origin
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    /// Raw robots.txt content; `None` allows everything
    content: Option<String>,
}

impl ParsedRobots {
    /// Creates rules from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        let trimmed = content.trim();
        Self {
            content: (!trimmed.is_empty()).then(|| content.to_string()),
        }
    }

    /// Creates rules that allow every page
    ///
    /// Used when robots.txt is missing or cannot be fetched.
    pub fn allow_all() -> Self {
        Self { content: None }
    }

    /// Returns true if no rules were loaded
    pub fn is_allow_all(&self) -> bool {
        self.content.is_none()
    }

    /// Checks if `url` may be fetched by `user_agent`
    ///
    /// # Arguments
    ///
    /// * `url` - The page URL
    /// * `user_agent` - The full user agent string sent with the request
    pub fn is_allowed(&self, url: &Url, user_agent: &str) -> bool {
        match &self.content {
            None => true,
            Some(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, user_agent, url.as_str())
            }
        }
    }
}

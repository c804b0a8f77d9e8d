//! Page numbers encoded in catalog URLs
//!
//! Catalogs put the page index either in a path segment (`/page/3`,
//! `/catalogue/page-3.html`, `/p3.html`) or in a query parameter
//! (`?page=3`, `?p=3`). This module finds that number and rewrites it
//! without touching the rest of the URL.

use url::Url;

/// Query parameters that carry a page index, in lookup order
const PAGE_PARAMS: &[&str] = &["page", "p", "pagenum"];

/// Segment prefixes that introduce a page index, longest first
const SEGMENT_PREFIXES: &[&str] = &["page-", "page_", "page", "p"];

/// Extensions allowed after the number in a path segment
const SEGMENT_SUFFIXES: &[&str] = &[".html", ".htm"];

/// Where the page number lives inside a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageNumberLocation {
    /// A path segment, at `index` among the path segments
    Segment {
        index: usize,
        prefix: String,
        suffix: String,
    },

    /// A query parameter with the given name
    Query(String),
}

/// A page number found in a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageNumber {
    pub value: u32,
    pub location: PageNumberLocation,
}

impl PageNumber {
    /// Name used when the number is set through a browser action
    pub fn param_name(&self) -> &str {
        match &self.location {
            PageNumberLocation::Query(name) => name,
            PageNumberLocation::Segment { .. } => "page",
        }
    }
}

/// Finds the page number in a URL
///
/// Path forms are checked first, scanning segments from the end; query
/// parameters second.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use catalog_ripple::url::find_page_number;
///
/// let url = Url::parse("https://books.toscrape.com/catalogue/page-2.html").unwrap();
/// assert_eq!(find_page_number(&url).map(|p| p.value), Some(2));
/// ```
pub fn find_page_number(url: &Url) -> Option<PageNumber> {
    find_in_path(url).or_else(|| find_in_query(url))
}

fn find_in_path(url: &Url) -> Option<PageNumber> {
    let segments: Vec<&str> = url.path_segments()?.collect();

    for (index, segment) in segments.iter().enumerate().rev() {
        // "/page/3"
        if index > 0 && segments[index - 1].eq_ignore_ascii_case("page") {
            if let Ok(value) = segment.parse::<u32>() {
                return Some(PageNumber {
                    value,
                    location: PageNumberLocation::Segment {
                        index,
                        prefix: String::new(),
                        suffix: String::new(),
                    },
                });
            }
        }

        if let Some(found) = parse_segment(index, segment) {
            return Some(found);
        }
    }

    None
}

/// Parses segments of the form `<prefix><digits>[<suffix>]`
fn parse_segment(index: usize, segment: &str) -> Option<PageNumber> {
    let lower = segment.to_ascii_lowercase();
    let (stem, suffix) = SEGMENT_SUFFIXES
        .iter()
        .find_map(|ext| lower.strip_suffix(ext).map(|stem| (stem, *ext)))
        .unwrap_or((lower.as_str(), ""));

    for prefix in SEGMENT_PREFIXES {
        let Some(digits) = stem.strip_prefix(prefix) else {
            continue;
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let value = digits.parse::<u32>().ok()?;
        return Some(PageNumber {
            value,
            location: PageNumberLocation::Segment {
                index,
                prefix: segment[..prefix.len()].to_string(),
                suffix: segment[segment.len() - suffix.len()..].to_string(),
            },
        });
    }

    None
}

fn find_in_query(url: &Url) -> Option<PageNumber> {
    PAGE_PARAMS.iter().find_map(|param| {
        url.query_pairs()
            .find(|(k, _)| k == param)
            .and_then(|(_, v)| v.trim().parse::<u32>().ok())
            .map(|value| PageNumber {
                value,
                location: PageNumberLocation::Query(param.to_string()),
            })
    })
}

/// Returns a copy of `url` with its page number replaced by `next`
///
/// Everything except the located number is preserved, including the order
/// of query parameters.
pub fn with_page_number(url: &Url, found: &PageNumber, next: u32) -> Url {
    let mut rewritten = url.clone();

    match &found.location {
        PageNumberLocation::Segment {
            index,
            prefix,
            suffix,
        } => {
            let segments: Vec<String> = url
                .path_segments()
                .map(|s| s.map(str::to_string).collect())
                .unwrap_or_default();
            let path = segments
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    if i == *index {
                        format!("{}{}{}", prefix, next, suffix)
                    } else {
                        s.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join("/");
            rewritten.set_path(&format!("/{}", path));
        }
        PageNumberLocation::Query(param) => {
            let pairs: Vec<(String, String)> = url
                .query_pairs()
                .map(|(k, v)| {
                    if k == param.as_str() {
                        (k.to_string(), next.to_string())
                    } else {
                        (k.to_string(), v.to_string())
                    }
                })
                .collect();
            rewritten.query_pairs_mut().clear().extend_pairs(pairs);
        }
    }

    rewritten
}

/// Returns a copy of `url` with the page query parameter set to `page`
///
/// Used when a catalog has no page number yet; the first page is implied.
pub fn with_page_param(url: &Url, param: &str, page: u32) -> Url {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != param)
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    pairs.push((param.to_string(), page.to_string()));

    let mut rewritten = url.clone();
    rewritten.query_pairs_mut().clear().extend_pairs(pairs);
    rewritten
}

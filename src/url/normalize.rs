use crate::UrlError;
use url::Url;

/// List of tracking query parameters ignored when comparing pages
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "source",
];

/// Directory index file names that address the same page as their directory
const INDEX_FILES: &[&str] = &["index.html", "index.htm"];

/// Parses and validates a catalog start URL
///
/// Only HTTP(S) URLs with a host are accepted. Surrounding whitespace is
/// trimmed and the fragment removed; nothing else is rewritten, so the
/// request goes out exactly as the user wrote it.
///
/// # Examples
///
/// ```
/// use catalog_ripple::url::parse_start_url;
///
/// let url = parse_start_url("  https://books.toscrape.com/#top ").unwrap();
/// assert_eq!(url.as_str(), "https://books.toscrape.com/");
/// ```
pub fn parse_start_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);
    Ok(url)
}

/// Builds the key used to recognise two URLs as the same catalog page
///
/// # Normalization Steps
///
/// 1. Drop the scheme (http and https address the same page)
/// 2. Lowercase the host and remove a `www.` prefix
/// 3. Keep an explicit port
/// 4. Normalize the path:
///    - Remove dot segments and empty segments
///    - Remove a trailing `index.html` / `index.htm`
///    - Remove the trailing slash (except for root /)
/// 5. Drop the fragment
/// 6. Drop tracking query parameters and sort the rest
///
/// # Examples
///
/// ```
/// use catalog_ripple::url::canonical_key;
/// use url::Url;
///
/// let a = Url::parse("https://WWW.Shop.com/catalogue/index.html?utm_source=x").unwrap();
/// let b = Url::parse("http://shop.com/catalogue/").unwrap();
/// assert_eq!(canonical_key(&a), canonical_key(&b));
/// ```
pub fn canonical_key(url: &Url) -> String {
    let host = url
        .host_str()
        .map(|h| {
            let h = h.to_lowercase();
            h.strip_prefix("www.").map(str::to_string).unwrap_or(h)
        })
        .unwrap_or_default();

    let mut key = host;
    if let Some(port) = url.port() {
        key.push(':');
        key.push_str(&port.to_string());
    }

    key.push_str(&normalize_path(url.path()));

    let params = filter_and_sort_query_params(url);
    if !params.is_empty() {
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        key.push('?');
        key.push_str(&query);
    }

    key
}

/// Normalizes a URL path by removing dot segments, index files and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments
        .last()
        .is_some_and(|last| INDEX_FILES.contains(last))
    {
        normalized_segments.pop();
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}

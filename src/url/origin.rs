use url::Url;

/// Extracts the origin (`scheme://host[:port]`) of a URL
///
/// Robots rules apply per origin, so this is the key the robots cache uses.
/// The host is lowercased and the default port for the scheme is omitted.
///
/// # Returns
///
/// * `Some(String)` - The origin, without a trailing slash
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use catalog_ripple::url::extract_origin;
///
/// let url = Url::parse("https://Books.ToScrape.com/catalogue/page-2.html").unwrap();
/// assert_eq!(extract_origin(&url), Some("https://books.toscrape.com".to_string()));
/// ```
pub fn extract_origin(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}://{}:{}", url.scheme(), host, port)),
        None => Some(format!("{}://{}", url.scheme(), host)),
    }
}

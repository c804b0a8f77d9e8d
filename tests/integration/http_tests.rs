//! End-to-end scrapes against mock HTTP servers
//!
//! These tests use wiremock to serve catalog pages and exercise the real
//! HTTP fetcher and the HTTP-backed browser session.

use crate::common::{catalog_page, test_rotator};
use catalog_ripple::config::{HttpConfig, SelectorConfig};
use catalog_ripple::crawler::{
    run_scrape, CatalogTemplate, FetchMode, HttpBrowserDriver, HttpFetcher, RetryPolicy,
    ScrapeOutcome, ScrapeRequest,
};
use catalog_ripple::output::{write_output, write_run_summary, OutputFormat};
use catalog_ripple::pagination::PaginationGuard;
use catalog_ripple::state::{FailureReason, PageRef, StopReason};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

/// A listing without a next control that says which page it is
fn numbered_page(page: u32, of: u32, items: usize) -> String {
    catalog_page(page, items, None).replace(
        "</body>",
        &format!(r#"<ul class="pager"><li class="current">Page {} of {}</li></ul></body>"#, page, of),
    )
}

async fn mount_three_pages(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/catalogue/page-1.html"))
        .and(header_exists("accept-language"))
        .respond_with(html(catalog_page(1, 10, Some("page-2.html"))))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-2.html"))
        .respond_with(html(catalog_page(2, 10, Some("page-3.html"))))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-3.html"))
        .respond_with(html(catalog_page(3, 5, None)))
        .mount(server)
        .await;
}

fn start(server: &MockServer, path_and_query: &str) -> PageRef {
    PageRef::Url(Url::parse(&format!("{}{}", server.uri(), path_and_query)).unwrap())
}

fn static_mode() -> FetchMode {
    FetchMode::Static(Box::new(HttpFetcher::new(&HttpConfig::default()).unwrap()))
}

fn dynamic_mode() -> FetchMode {
    FetchMode::Dynamic(Box::new(HttpBrowserDriver::new(HttpConfig::default())))
}

fn request(start: PageRef, mode: FetchMode, max_attempts: u32) -> ScrapeRequest {
    ScrapeRequest {
        start,
        mode,
        max_products: 0,
        retry_policy: RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            backoff_multiplier: 2.0,
        },
        guard: PaginationGuard::default(),
        rotator: test_rotator(),
    }
}

async fn scrape(request: ScrapeRequest) -> ScrapeOutcome {
    let extractor = CatalogTemplate::from_config(&SelectorConfig::default()).unwrap();
    run_scrape(request, &extractor, CancellationToken::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_static_scrape_follows_next_links() {
    let server = MockServer::start().await;
    mount_three_pages(&server).await;

    let outcome = scrape(request(
        start(&server, "/catalogue/page-1.html"),
        static_mode(),
        3,
    ))
    .await;

    assert_eq!(outcome.items.len(), 25);
    assert_eq!(outcome.pages_visited, 3);
    assert_eq!(outcome.stop_reason, StopReason::NoNextPage);
    assert_eq!(outcome.items[0].price, "£0.99");
    assert_eq!(outcome.items[0].availability.as_deref(), Some("In stock"));
    assert_eq!(
        outcome.last_location.map(|u| u.path().to_string()),
        Some("/catalogue/page-3.html".to_string())
    );
}

#[tokio::test]
async fn test_static_scrape_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-2.html"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_three_pages(&server).await;

    let outcome = scrape(request(
        start(&server, "/catalogue/page-1.html"),
        static_mode(),
        3,
    ))
    .await;

    assert_eq!(outcome.items.len(), 25);
    assert_eq!(outcome.stop_reason, StopReason::NoNextPage);
}

#[tokio::test]
async fn test_static_scrape_stops_on_missing_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-1.html"))
        .respond_with(html(catalog_page(1, 10, Some("page-2.html"))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-2.html"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = scrape(request(
        start(&server, "/catalogue/page-1.html"),
        static_mode(),
        3,
    ))
    .await;

    assert_eq!(outcome.items.len(), 10);
    assert_eq!(outcome.pages_visited, 1);
    assert_eq!(
        outcome.stop_reason,
        StopReason::FatalFetchFailure(FailureReason::NotFound { status: 404 })
    );
}

#[tokio::test]
async fn test_rate_limit_reports_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-1.html"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let outcome = scrape(request(
        start(&server, "/catalogue/page-1.html"),
        static_mode(),
        1,
    ))
    .await;

    assert!(outcome.items.is_empty());
    assert_eq!(outcome.pages_visited, 0);
    assert_eq!(
        outcome.stop_reason,
        StopReason::FatalFetchFailure(FailureReason::RateLimited {
            retry_after: Some(Duration::from_secs(7))
        })
    );
}

#[tokio::test]
async fn test_challenge_page_is_blocked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-1.html"))
        .respond_with(html(
            "<html><head><title>Security check</title></head><body>Please complete the captcha</body></html>"
                .to_string(),
        ))
        .mount(&server)
        .await;

    let outcome = scrape(request(
        start(&server, "/catalogue/page-1.html"),
        static_mode(),
        1,
    ))
    .await;

    assert!(matches!(
        outcome.stop_reason,
        StopReason::FatalFetchFailure(FailureReason::Blocked { .. })
    ));
}

#[tokio::test]
async fn test_binary_content_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89, 0x50, 0x4e, 0x47], "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = scrape(request(
        start(&server, "/catalogue/page-1.html"),
        static_mode(),
        3,
    ))
    .await;

    assert!(matches!(
        outcome.stop_reason,
        StopReason::FatalFetchFailure(FailureReason::Malformed { .. })
    ));
}

#[tokio::test]
async fn test_robots_txt_disallow_is_respected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/page-1.html"))
        .respond_with(html(catalog_page(1, 10, None)))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = scrape(request(
        start(&server, "/private/page-1.html"),
        static_mode(),
        3,
    ))
    .await;

    assert_eq!(outcome.pages_visited, 0);
    assert_eq!(
        outcome.stop_reason,
        StopReason::FatalFetchFailure(FailureReason::RobotsDenied)
    );
}

#[tokio::test]
async fn test_static_scrape_increments_page_number() {
    let server = MockServer::start().await;
    for page in 1..=3 {
        Mock::given(method("GET"))
            .and(path("/shop"))
            .and(query_param("page", page.to_string()))
            .respond_with(html(numbered_page(page, 3, 4)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let outcome = scrape(request(start(&server, "/shop?page=1"), static_mode(), 3)).await;

    assert_eq!(outcome.items.len(), 12);
    assert_eq!(outcome.pages_visited, 3);
    assert_eq!(outcome.stop_reason, StopReason::NoNextPage);
}

#[tokio::test]
async fn test_dynamic_scrape_follows_next_controls() {
    let server = MockServer::start().await;
    mount_three_pages(&server).await;

    let outcome = scrape(request(
        start(&server, "/catalogue/page-1.html"),
        dynamic_mode(),
        3,
    ))
    .await;

    assert_eq!(outcome.items.len(), 25);
    assert_eq!(outcome.pages_visited, 3);
    assert_eq!(outcome.stop_reason, StopReason::NoNextPage);
    assert_eq!(outcome.mode, "dynamic");
}

#[tokio::test]
async fn test_dynamic_scrape_sets_page_parameter() {
    let server = MockServer::start().await;
    for page in 1..=3 {
        Mock::given(method("GET"))
            .and(path("/shop"))
            .and(query_param("page", page.to_string()))
            .respond_with(html(numbered_page(page, 3, 4)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let outcome = scrape(request(start(&server, "/shop?page=1"), dynamic_mode(), 3)).await;

    assert_eq!(outcome.items.len(), 12);
    assert_eq!(outcome.pages_visited, 3);
    assert_eq!(outcome.stop_reason, StopReason::NoNextPage);
    assert_eq!(
        outcome.last_location.and_then(|u| u.query().map(str::to_string)),
        Some("page=3".to_string())
    );
}

#[tokio::test]
async fn test_scrape_results_written_to_disk() {
    let server = MockServer::start().await;
    mount_three_pages(&server).await;
    let dir = TempDir::new().unwrap();

    let mut request = request(start(&server, "/catalogue/page-1.html"), static_mode(), 3);
    request.max_products = 15;
    let outcome = scrape(request).await;

    let written = write_output(&outcome.items, OutputFormat::Both, dir.path()).unwrap();
    assert_eq!(written.len(), 2);

    let json = std::fs::read_to_string(&written[0]).unwrap();
    let records: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
    assert_eq!(records.len(), 15);

    let csv = std::fs::read_to_string(&written[1]).unwrap();
    assert_eq!(csv.lines().count(), 16);

    let summary = dir.path().join("summary.md");
    write_run_summary(&[outcome], Some("abc"), &summary).unwrap();
    let report = std::fs::read_to_string(&summary).unwrap();
    assert!(report.contains("product cap reached"));
}

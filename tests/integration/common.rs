//! Catalog markup and fixtures shared by the integration tests

use catalog_ripple::fingerprint::{Fingerprint, FingerprintRotator, RotationOrder};
use std::time::Duration;

/// Builds a books.toscrape-style listing page
///
/// # Arguments
///
/// * `page` - Page number, used to make product names unique
/// * `items` - Number of products on the page
/// * `next` - Target of the "next" control, if the page has one
pub fn catalog_page(page: u32, items: usize, next: Option<&str>) -> String {
    let mut html = String::from(
        "<html><head><title>All products | Books to Scrape</title></head><body><ol class=\"row\">",
    );

    for i in 0..items {
        html.push_str(&format!(
            r#"<li><article class="product_pod">
                <div class="image_container"><a href="catalogue/book-{page}-{i}.html"><img src="media/book-{page}-{i}.jpg" alt="Book {page}-{i}"></a></div>
                <p class="star-rating Four"></p>
                <h3><a href="catalogue/book-{page}-{i}.html" title="Book {page}-{i}">Book {page}-{i}</a></h3>
                <div class="product_price">
                    <p class="price_color">£{i}.99</p>
                    <p class="instock availability">In stock</p>
                </div>
            </article></li>"#,
            page = page,
            i = i
        ));
    }
    html.push_str("</ol>");

    if let Some(next) = next {
        html.push_str(&format!(
            r#"<ul class="pager"><li class="current">Page {}</li><li class="next"><a href="{}">next</a></li></ul>"#,
            page, next
        ));
    }

    html.push_str("</body></html>");
    html
}

/// A rotator over two identities with no delay hint or jitter
pub fn test_rotator() -> FingerprintRotator {
    FingerprintRotator::new(
        vec![
            Fingerprint::new("AgentA/1.0", Duration::ZERO),
            Fingerprint::new("AgentB/1.0", Duration::ZERO),
        ],
        RotationOrder::Random,
    )
    .unwrap()
    .with_seed(7)
}

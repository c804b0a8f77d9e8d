//! Product extraction from catalog pages
//!
//! This module turns a fetched page into product records:
//! - `CatalogTemplate` reads server-rendered listings with CSS selectors
//! - `NextDataExtractor` reads the JSON state embedded by Next.js sites
//!
//! Both are plugged into the page loop through the `ItemExtractor` trait.

use crate::config::SelectorConfig;
use crate::state::RawPage;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// A product scraped from a catalog page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub price: String,
    pub availability: Option<String>,
    pub image: Option<String>,
    pub url: Option<String>,
    /// Star rating, 1 to 5
    pub rating: Option<u8>,
}

impl ProductRecord {
    pub fn new(name: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price: price.into(),
            availability: None,
            image: None,
            url: None,
            rating: None,
        }
    }
}

/// Extracts product records from a fetched page
///
/// Extraction never fails: markup it cannot read yields fewer records.
pub trait ItemExtractor: Send + Sync {
    fn extract(&self, page: &RawPage) -> Vec<ProductRecord>;
}

/// Extracts the page title from the HTML document
pub fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Selector-driven extractor for server-rendered product listings
#[derive(Debug, Clone)]
pub struct CatalogTemplate {
    item: Selector,
    name: Selector,
    name_attr: Option<String>,
    price: Selector,
    availability: Option<Selector>,
    image: Option<Selector>,
    link: Option<Selector>,
    rating: Option<Selector>,
}

impl CatalogTemplate {
    /// Compiles the configured selectors
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` naming the first selector that does
    /// not parse.
    pub fn from_config(config: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            item: compile("item", &config.item)?,
            name: compile("name", &config.name)?,
            name_attr: config.name_attr.clone().filter(|a| !a.is_empty()),
            price: compile("price", &config.price)?,
            availability: compile_optional("availability", config.availability.as_deref())?,
            image: compile_optional("image", config.image.as_deref())?,
            link: compile_optional("link", config.link.as_deref())?,
            rating: compile_optional("rating", config.rating.as_deref())?,
        })
    }

    /// Reads one listing element
    fn read_item(&self, item: &ElementRef, base: &Url) -> Option<ProductRecord> {
        let name_el = item.select(&self.name).next()?;
        let name = self
            .name_attr
            .as_deref()
            .and_then(|attr| name_el.value().attr(attr))
            .map(str::to_string)
            .unwrap_or_else(|| collapse_text(&name_el));
        let price = item
            .select(&self.price)
            .next()
            .map(|el| collapse_text(&el))?;

        if name.is_empty() || price.is_empty() {
            return None;
        }

        let availability = self
            .availability
            .as_ref()
            .and_then(|sel| item.select(sel).next())
            .map(|el| collapse_text(&el))
            .filter(|s| !s.is_empty());

        let image = self
            .image
            .as_ref()
            .and_then(|sel| item.select(sel).next())
            .and_then(|el| el.value().attr("src").or_else(|| el.value().attr("data-src")))
            .and_then(|src| base.join(src.trim()).ok())
            .map(String::from);

        let url = self
            .link
            .as_ref()
            .and_then(|sel| item.select(sel).next())
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| base.join(href.trim()).ok())
            .map(String::from);

        let rating = self
            .rating
            .as_ref()
            .and_then(|sel| item.select(sel).next())
            .and_then(|el| el.value().classes().find_map(rating_from_word));

        Some(ProductRecord {
            name,
            price,
            availability,
            image,
            url,
            rating,
        })
    }
}

impl ItemExtractor for CatalogTemplate {
    fn extract(&self, page: &RawPage) -> Vec<ProductRecord> {
        let document = Html::parse_document(&page.body);
        let mut skipped = 0usize;

        let records: Vec<ProductRecord> = document
            .select(&self.item)
            .filter_map(|item| {
                let record = self.read_item(&item, &page.url);
                if record.is_none() {
                    skipped += 1;
                }
                record
            })
            .collect();

        if skipped > 0 {
            tracing::debug!(
                "Skipped {} listings without name or price on {}",
                skipped,
                page.url
            );
        }

        records
    }
}

fn compile(field: &str, raw: &str) -> Result<Selector, ConfigError> {
    Selector::parse(raw)
        .map_err(|e| ConfigError::Validation(format!("Invalid {} selector '{}': {:?}", field, raw, e)))
}

fn compile_optional(field: &str, raw: Option<&str>) -> Result<Option<Selector>, ConfigError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => compile(field, raw).map(Some),
        None => Ok(None),
    }
}

/// Element text with runs of whitespace collapsed
fn collapse_text(element: &ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Maps rating classes such as `Three` or `rating-4` to a number
fn rating_from_word(class: &str) -> Option<u8> {
    let word = class.rsplit('-').next().unwrap_or(class);
    match word.to_ascii_lowercase().as_str() {
        "one" | "1" => Some(1),
        "two" | "2" => Some(2),
        "three" | "3" => Some(3),
        "four" | "4" => Some(4),
        "five" | "5" => Some(5),
        _ => None,
    }
}

/// Extractor for Next.js pages carrying `script#__NEXT_DATA__`
///
/// Reads `props.pageProps.product_list`. Product URLs are built as
/// `<product_base_url><slug>`.
#[derive(Debug, Clone)]
pub struct NextDataExtractor {
    product_base_url: Option<Url>,
}

impl NextDataExtractor {
    pub fn new(product_base_url: Option<Url>) -> Self {
        Self { product_base_url }
    }

    fn read_product(&self, value: &Value, page_url: &Url) -> Option<ProductRecord> {
        let name = json_text(value.get("name")?)?;
        let price = json_text(value.get("price")?)?;

        let image = value
            .get("featured_image")
            .or_else(|| value.get("image"))
            .and_then(json_text)
            .and_then(|src| page_url.join(&src).ok())
            .map(String::from);

        let url = value.get("slug").and_then(json_text).and_then(|slug| {
            let base = self.product_base_url.as_ref().unwrap_or(page_url);
            base.join(slug.trim_start_matches('/')).ok().map(String::from)
        });

        let availability = value
            .get("stock_status")
            .or_else(|| value.get("availability"))
            .and_then(json_text);

        Some(ProductRecord {
            name,
            price,
            availability,
            image,
            url,
            rating: None,
        })
    }
}

impl ItemExtractor for NextDataExtractor {
    fn extract(&self, page: &RawPage) -> Vec<ProductRecord> {
        let document = Html::parse_document(&page.body);
        let Ok(script_selector) = Selector::parse("script#__NEXT_DATA__") else {
            return Vec::new();
        };

        let Some(script) = document.select(&script_selector).next() else {
            tracing::debug!("No __NEXT_DATA__ script on {}", page.url);
            return Vec::new();
        };

        let content = script.text().collect::<String>();
        let data: Value = match serde_json::from_str(&content) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Failed to parse __NEXT_DATA__ on {}: {}", page.url, e);
                return Vec::new();
            }
        };

        data.pointer("/props/pageProps/product_list")
            .and_then(Value::as_array)
            .map(|products| {
                products
                    .iter()
                    .filter_map(|p| self.read_product(p, &page.url))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Renders a JSON scalar as text; empty strings and nulls yield `None`
fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

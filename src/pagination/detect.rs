//! Navigation affordance detection
//!
//! Looks through a parsed catalog page for the controls that lead to the next
//! page, and for indicators of how many pages the catalog has.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Explicit "next page" controls, tried in order
const NEXT_SELECTORS: &[&str] = &[
    "li.next a",
    "a[rel=next]",
    "link[rel=next]",
    ".next a",
    "a.next",
    ".pagination .next",
    ".pager-next a",
    ".pagination-next a",
    ".next-page",
    "a[aria-label*=next]",
    "a[aria-label*=Next]",
    "a[title*=next]",
    "a[title*=Next]",
];

/// Containers holding numbered page links
const PAGINATION_CONTAINERS: &[&str] = &[
    ".pagination",
    ".pager",
    ".page-numbers",
    ".paginate",
    ".page-nav",
    ".pagination-wrapper",
];

/// Link texts that mean "next" inside a numbered pagination container
const NEXT_TEXTS: &[&str] = &["next", ">", "»", "→"];

/// "Load more" controls, tried in order
const LOAD_MORE_SELECTORS: &[&str] = &[
    ".load-more",
    ".show-more",
    ".view-more",
    "[data-next-url]",
    "[data-load-more]",
];

/// Attributes a load-more control may keep its target in
const LOAD_MORE_ATTRS: &[&str] = &["data-next-url", "data-load-more", "data-url", "href"];

/// Attributes declaring the number of pages
const TOTAL_PAGE_ATTRS: &[&str] = &["data-total-pages", "data-last-page", "data-page-count"];

/// Which detection rule produced a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextRule {
    NextControl,
    NumberedLink,
    LoadMore,
}

/// A control leading to the next page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextLink {
    /// The selector that matched the control
    pub selector: String,

    /// Resolved target, if the markup carries one
    pub target: Option<Url>,

    /// False for `<link rel=next>` and other head-only hints
    pub clickable: bool,

    pub rule: NextRule,
}

/// Finds the first usable next-page control
///
/// Rules are tried in order: explicit next controls, numbered pagination
/// links (`current_index + 1` or a "next" arrow), load-more controls.
/// Disabled controls are skipped. A control with a fetchable target always
/// wins over one without, even when the targetless one ranks higher. With
/// `require_target`, targetless controls are never returned.
pub fn find_next_link(
    document: &Html,
    base: &Url,
    current_index: u32,
    require_target: bool,
) -> Option<NextLink> {
    let targeted = first_next_link(document, base, current_index, true);
    if targeted.is_some() || require_target {
        return targeted;
    }

    first_next_link(document, base, current_index, false)
}

fn first_next_link(
    document: &Html,
    base: &Url,
    current_index: u32,
    require_target: bool,
) -> Option<NextLink> {
    find_next_control(document, base, require_target)
        .or_else(|| find_numbered_next(document, base, current_index, require_target))
        .or_else(|| find_load_more(document, base, require_target))
}

fn find_next_control(document: &Html, base: &Url, require_target: bool) -> Option<NextLink> {
    for raw in NEXT_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };

        for element in document.select(&selector) {
            if is_disabled(&element) {
                tracing::trace!("Skipping disabled next control '{}'", raw);
                continue;
            }

            let target = element_target(&element, base);
            if require_target && target.is_none() {
                continue;
            }

            return Some(NextLink {
                selector: raw.to_string(),
                target,
                clickable: element.value().name() != "link",
                rule: NextRule::NextControl,
            });
        }
    }

    None
}

fn find_numbered_next(
    document: &Html,
    base: &Url,
    current_index: u32,
    require_target: bool,
) -> Option<NextLink> {
    let wanted = current_index.saturating_add(1).to_string();
    let link_selector = Selector::parse("a").ok()?;

    for raw in PAGINATION_CONTAINERS {
        let Ok(container_selector) = Selector::parse(raw) else {
            continue;
        };

        for container in document.select(&container_selector) {
            for link in container.select(&link_selector) {
                let text = element_text(&link).to_lowercase();
                if text != wanted && !NEXT_TEXTS.contains(&text.as_str()) {
                    continue;
                }
                if is_disabled(&link) {
                    continue;
                }

                let target = element_target(&link, base);
                if require_target && target.is_none() {
                    continue;
                }

                return Some(NextLink {
                    selector: format!("{} a", raw),
                    target,
                    clickable: true,
                    rule: NextRule::NumberedLink,
                });
            }
        }
    }

    None
}

fn find_load_more(document: &Html, base: &Url, require_target: bool) -> Option<NextLink> {
    for raw in LOAD_MORE_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };

        for element in document.select(&selector) {
            if is_disabled(&element) {
                continue;
            }

            let target = LOAD_MORE_ATTRS
                .iter()
                .filter_map(|attr| element.value().attr(attr))
                .find_map(|value| resolve_target(value, base));
            if require_target && target.is_none() {
                continue;
            }

            return Some(NextLink {
                selector: raw.to_string(),
                target,
                clickable: true,
                rule: NextRule::LoadMore,
            });
        }
    }

    None
}

/// Finds the last page number the page declares
///
/// Sources, first match wins: a "Page X of Y" text, a total-pages data
/// attribute, the largest numeric link in a pagination container.
pub fn find_last_page(document: &Html) -> Option<u32> {
    let body_text = document.root_element().text().collect::<Vec<_>>().join(" ");
    if let Some((_, total)) = parse_page_of(&body_text) {
        return Some(total);
    }

    for attr in TOTAL_PAGE_ATTRS {
        let Ok(selector) = Selector::parse(&format!("[{}]", attr)) else {
            continue;
        };
        let declared = document
            .select(&selector)
            .filter_map(|el| el.value().attr(attr))
            .find_map(|value| value.trim().parse::<u32>().ok());
        if declared.is_some() {
            return declared;
        }
    }

    let link_selector = Selector::parse("a").ok()?;
    PAGINATION_CONTAINERS
        .iter()
        .filter_map(|raw| Selector::parse(raw).ok())
        .flat_map(|container_selector| {
            document
                .select(&container_selector)
                .flat_map(|container| container.select(&link_selector))
                .filter_map(|link| element_text(&link).parse::<u32>().ok())
                .collect::<Vec<_>>()
        })
        .max()
}

/// Parses the first "Page X of Y" in `text`
pub fn parse_page_of(text: &str) -> Option<(u32, u32)> {
    let lower = text.to_lowercase();
    let mut rest = lower.as_str();

    while let Some(pos) = rest.find("page") {
        rest = &rest[pos + "page".len()..];
        let mut words = rest.split_whitespace();
        let current = words.next().and_then(|w| w.parse::<u32>().ok());
        let of = words.next();
        let total = words.next().and_then(|w| {
            w.trim_end_matches(|c: char| !c.is_ascii_digit())
                .parse::<u32>()
                .ok()
        });

        if let (Some(current), Some("of"), Some(total)) = (current, of, total) {
            return Some((current, total));
        }
    }

    None
}

/// Returns true if the element or its parent is marked disabled
fn is_disabled(element: &ElementRef) -> bool {
    let marked = |el: &ElementRef| {
        let value = el.value();
        value.classes().any(|c| c.eq_ignore_ascii_case("disabled"))
            || value.attr("disabled").is_some()
            || value.attr("aria-disabled") == Some("true")
    };

    marked(element)
        || element
            .parent()
            .and_then(ElementRef::wrap)
            .is_some_and(|parent| marked(&parent))
}

/// Target of a control: its own `href`, or the first link inside it
fn element_target(element: &ElementRef, base: &Url) -> Option<Url> {
    if let Some(href) = element.value().attr("href") {
        return resolve_target(href, base);
    }

    let link_selector = Selector::parse("a[href]").ok()?;
    element
        .select(&link_selector)
        .next()
        .and_then(|link| link.value().attr("href"))
        .and_then(|href| resolve_target(href, base))
}

/// Resolves a raw target against the page URL
///
/// Fragment-only and `javascript:` targets are not fetchable and yield `None`.
pub fn resolve_target(raw: &str, base: &Url) -> Option<Url> {
    let raw = raw.trim();

    if raw.is_empty() || raw.starts_with('#') || raw.to_lowercase().starts_with("javascript:") {
        return None;
    }

    let resolved = base.join(raw).ok()?;
    if resolved.scheme() == "http" || resolved.scheme() == "https" {
        Some(resolved)
    } else {
        None
    }
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

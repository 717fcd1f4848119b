//! HTML parser for extracting links and embedded resources
//!
//! This module splits the references on a page into two groups:
//! - Links to follow (`<a href>` and `<area href>`), handed to the scheduler
//! - Embedded resources (`src`, `data-src` and `href` on every other
//!   element), handed to the resource harvester

use crate::url::canonicalize_url;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Attributes that reference an embedded resource
const RESOURCE_ATTRIBUTES: &[&str] = &["src", "data-src", "href"];

/// Elements whose `href` is navigation rather than an embedded resource
const NAVIGATION_ELEMENTS: &[&str] = &["a", "area"];

/// References extracted from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// Outbound links, canonical and in document order, without duplicates
    pub links: Vec<Url>,

    /// Embedded resources, canonical and in document order, without duplicates
    pub resources: Vec<Url>,
}

/// Parses HTML content and extracts links and resources
///
/// # Exclusions
///
/// - `javascript:`, `mailto:`, `tel:` and `data:` references
/// - fragment-only references
/// - anything that is not http(s) after resolution
///
/// # Example
///
/// ```
/// use site_harvest::crawler::parse_page;
/// use url::Url;
///
/// let html = r#"<a href="/next">Next</a><img src="logo.png">"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_page(html, &base);
/// assert_eq!(parsed.links[0].as_str(), "https://example.com/next");
/// assert_eq!(parsed.resources[0].as_str(), "https://example.com/logo.png");
/// ```
pub fn parse_page(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);
    let base_url = document_base(&document, base_url);

    ParsedPage {
        links: extract_links(&document, &base_url),
        resources: extract_resources(&document, &base_url),
    }
}

/// Honors a `<base href>` element when present
fn document_base(document: &Html, page_url: &Url) -> Url {
    let Ok(selector) = Selector::parse("base[href]") else {
        return page_url.clone();
    };
    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let Ok(selector) = Selector::parse("a[href], area[href]") else {
        return links;
    };

    for element in document.select(&selector) {
        if let Some(href) = element.value().attr("href") {
            if let Some(url) = resolve_link(href, base_url) {
                if seen.insert(url.to_string()) {
                    links.push(url);
                }
            }
        }
    }

    links
}

fn extract_resources(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut resources = Vec::new();

    let Ok(selector) = Selector::parse("[src], [data-src], [href]") else {
        return resources;
    };

    for element in document.select(&selector) {
        let name = element.value().name();
        for attr in RESOURCE_ATTRIBUTES {
            if *attr == "href" && NAVIGATION_ELEMENTS.contains(&name) {
                continue;
            }
            // <base href> only changes how other references resolve
            if *attr == "href" && name == "base" {
                continue;
            }
            if let Some(value) = element.value().attr(attr) {
                if let Some(url) = resolve_link(value, base_url) {
                    if seen.insert(url.to_string()) {
                        resources.push(url);
                    }
                }
            }
        }
    }

    resources
}

/// Resolves a reference to a canonical absolute URL
///
/// Returns None if the reference should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only references
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    canonicalize_url(absolute.as_str()).ok()
}

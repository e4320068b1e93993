//! HTML extraction
//!
//! Pulls visible text, the title and outbound links from a page:
//! - Links come from `<a href>` and `<link rel="canonical">`
//! - `javascript:`, `mailto:`, `tel:` and data URIs are dropped
//! - Text inside script, style, noscript and template elements is not visible

use crate::crawler::traits::{Extraction, Extractor};
use scraper::{Html, Node, Selector};
use url::Url;

const INVISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Default `Extractor` built on scraper
#[derive(Debug, Clone, Default)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for HtmlExtractor {
    fn extract(&self, body: &str, base_url: &Url) -> Extraction {
        let document = Html::parse_document(body);
        let text = extract_visible_text(&document);
        let record_count = usize::from(!text.is_empty());

        Extraction {
            title: extract_title(&document),
            links: extract_links(&document, base_url),
            text,
            record_count,
        }
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Visible text with whitespace runs collapsed to single spaces
fn extract_visible_text(document: &Html) -> String {
    let mut words: Vec<&str> = Vec::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| INVISIBLE_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }

    words.join(" ")
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    for selector in ["a[href]", "link[rel='canonical'][href]"] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        for element in document.select(&selector) {
            if let Some(absolute_url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            {
                links.push(absolute_url);
            }
        }
    }

    links
}

/// Resolves an href against the page URL, keeping only HTTP(S) targets
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    matches!(absolute_url.scheme(), "http" | "https").then(|| absolute_url.to_string())
}

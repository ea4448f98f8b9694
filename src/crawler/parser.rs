//! HTML parser for extracting link targets
//!
//! Every `<a href="...">` value is returned verbatim, in document order,
//! without deduplication or resolution.

use scraper::{Html, Selector};

/// Extracts every anchor `href` value from an HTML document
///
/// The parsed document is dropped before returning, so callers can hold the
/// result across `.await` points.
///
/// # Example
///
/// ```
/// use quote_harvest::crawler::extract_links;
///
/// let html = r#"<html><body><a href="/a">A</a><a href="/a">again</a></body></html>"#;
/// assert_eq!(extract_links(html), vec!["/a", "/a"]);
/// ```
pub fn extract_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(str::to_string)
        .collect()
}

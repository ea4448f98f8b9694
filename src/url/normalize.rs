use crate::{UrlError, UrlResult};
use url::Url;

/// Resolves a possibly-relative link reference against the target page
///
/// # Resolution Rules
///
/// 1. Trim surrounding whitespace and drop embedded ASCII tab, CR and LF,
///    as URL parsers do
/// 2. If the reference already parses as an absolute URL (it carries a
///    scheme), return it unchanged
/// 3. Otherwise join it onto `base` using RFC 3986 reference resolution
///    (`/path` is origin-relative, `path` is directory-relative, `//host`
///    is scheme-relative)
///
/// No canonicalisation is applied: the resolved string is the value that
/// gets fingerprinted, so two spellings of the same address are two items.
///
/// # Arguments
///
/// * `base` - The absolute URL of the fetched page
/// * `reference` - The raw `href` value found in the page
///
/// # Returns
///
/// * `Ok(String)` - Absolute URL
/// * `Err(UrlError)` - The reference is empty or cannot be joined onto `base`
///
/// # Examples
///
/// ```
/// use quote_harvest::url::resolve;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/quotes/page/1").unwrap();
/// assert_eq!(resolve(&base, "/author/x").unwrap(), "https://example.com/author/x");
/// assert_eq!(resolve(&base, "http://other.org/a").unwrap(), "http://other.org/a");
/// ```
pub fn resolve(base: &Url, reference: &str) -> UrlResult<String> {
    let reference = strip_tab_newline(reference.trim());
    let reference = reference.as_str();

    if reference.is_empty() {
        return Err(UrlError::Unresolvable {
            base: base.to_string(),
            reference: String::new(),
            message: "empty reference".to_string(),
        });
    }

    if is_absolute(reference) {
        return Ok(reference.to_string());
    }

    base.join(reference)
        .map(|url| url.to_string())
        .map_err(|e| UrlError::Unresolvable {
            base: base.to_string(),
            reference: reference.to_string(),
            message: e.to_string(),
        })
}

/// Parses the configured target locator, accepting only HTTP(S)
pub fn parse_target(target: &str) -> UrlResult<Url> {
    let url = Url::parse(target.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    Ok(url)
}

/// Removes every ASCII tab, CR and LF
fn strip_tab_newline(reference: &str) -> String {
    reference
        .chars()
        .filter(|c| !matches!(c, '\t' | '\r' | '\n'))
        .collect()
}

/// A reference is absolute when it parses on its own, i.e. it has a scheme
fn is_absolute(reference: &str) -> bool {
    Url::parse(reference).is_ok()
}

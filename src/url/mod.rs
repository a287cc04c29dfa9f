//! URL handling module
//!
//! This module provides link resolution for scraped `href`s and the
//! normalisation used as the frontier's URL-level dedup key.

mod normalize;

use url::Url;

// Re-export main functions
pub use normalize::{dedup_key, normalize_url};

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
///
/// # Examples
///
/// ```
/// use catalog_ripple::url::resolve_link;
/// use url::Url;
///
/// let base = Url::parse("https://shop.example/s?k=gaming").unwrap();
/// assert_eq!(
///     resolve_link("/Mouse/dp/B0ABCDE123", &base).as_deref(),
///     Some("https://shop.example/Mouse/dp/B0ABCDE123")
/// );
/// assert_eq!(resolve_link("javascript:void(0)", &base), None);
/// ```
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    // Skip empty hrefs
    if href.is_empty() {
        return None;
    }

    // Skip special schemes
    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    // Skip fragment-only links (same page anchors)
    if href.starts_with('#') {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

/// Checks whether two URLs share scheme, host and port
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://shop.example/s?k=gaming&page=2").unwrap()
    }

    #[test]
    fn test_resolve_absolute_link() {
        assert_eq!(
            resolve_link("https://other.example/dp/AAAAAAAAAA", &base_url()).as_deref(),
            Some("https://other.example/dp/AAAAAAAAAA")
        );
    }

    #[test]
    fn test_resolve_root_relative_link() {
        assert_eq!(
            resolve_link("/Widget/dp/AAAAAAAAAA/ref=sr_1_1?keywords=x", &base_url()).as_deref(),
            Some("https://shop.example/Widget/dp/AAAAAAAAAA/ref=sr_1_1?keywords=x")
        );
    }

    #[test]
    fn test_resolve_query_only_link() {
        assert_eq!(
            resolve_link("?k=gaming&page=3", &base_url()).as_deref(),
            Some("https://shop.example/s?k=gaming&page=3")
        );
    }

    #[test]
    fn test_skip_special_schemes() {
        assert_eq!(resolve_link("javascript:void(0)", &base_url()), None);
        assert_eq!(resolve_link("mailto:help@shop.example", &base_url()), None);
        assert_eq!(resolve_link("tel:+1234567890", &base_url()), None);
        assert_eq!(resolve_link("data:text/html,<h1>x</h1>", &base_url()), None);
    }

    #[test]
    fn test_skip_empty_and_fragment() {
        assert_eq!(resolve_link("   ", &base_url()), None);
        assert_eq!(resolve_link("#top", &base_url()), None);
    }

    #[test]
    fn test_skip_non_http_after_resolution() {
        assert_eq!(resolve_link("ftp://shop.example/file", &base_url()), None);
    }

    #[test]
    fn test_same_origin() {
        let a = Url::parse("https://shop.example/dp/AAAAAAAAAA").unwrap();
        let b = Url::parse("https://shop.example:443/ajax/twister").unwrap();
        let c = Url::parse("https://cdn.shop.example/ajax/twister").unwrap();
        let d = Url::parse("http://shop.example/ajax/twister").unwrap();
        assert!(same_origin(&a, &b));
        assert!(!same_origin(&a, &c));
        assert!(!same_origin(&a, &d));
    }
}

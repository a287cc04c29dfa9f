//! The anchored identifier pattern
//!
//! Extraction and rewriting both locate identifiers through [`locate`], so the
//! two can never disagree about which token in a URL is the identifier.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// Number of characters in an identifier body
pub const IDENTIFIER_LEN: usize = 10;

/// Path keywords that introduce an identifier segment
const PATH_KEYWORDS: &[&str] = &[
    "dp",
    "gp/product",
    "gp/aw/d",
    "gp/offer-listing",
    "exec/obidos/ASIN",
    "product-reviews",
];

/// Query parameter that carries an identifier
const QUERY_KEY: &str = "asin";

/// `/<keyword>/<ID>` or `?asin=<ID>` / `&asin=<ID>`, with the body followed by a
/// non-alphanumeric character or the end of the text.
static ANCHORED: LazyLock<Regex> = LazyLock::new(|| {
    let keywords = PATH_KEYWORDS.join("|");
    let pattern = format!(
        r"(?:(?:^|/)(?:{keywords})/|(?:^|[?&]){QUERY_KEY}=)([A-Z0-9]{{{IDENTIFIER_LEN}}})(?:[^A-Za-z0-9]|$)"
    );
    Regex::new(&pattern).expect("anchored identifier pattern is valid")
});

/// Returns the byte range of the first anchored identifier body in `text`
pub fn locate(text: &str) -> Option<Range<usize>> {
    ANCHORED
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|body| body.range())
}

/// Checks that `value` is exactly one identifier body
pub fn is_identifier_body(value: &str) -> bool {
    value.len() == IDENTIFIER_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

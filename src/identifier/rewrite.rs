use super::pattern::locate;
use super::Identifier;

/// Rewrites a product URL so it names a sibling identifier
///
/// Only the first anchored identifier token is replaced; the path, query and
/// fragment around it are kept byte for byte. Returns `None` when `base_url`
/// carries no anchored identifier, in which case no URL should be guessed.
///
/// # Examples
///
/// ```
/// use catalog_ripple::identifier::{rewrite, Identifier};
///
/// let sibling = Identifier::parse("CCCCCCCCCC").unwrap();
/// let url = rewrite("https://shop.example/Widget/dp/AAAAAAAAAA/ref=sr_1?th=1", &sibling);
/// assert_eq!(
///     url.as_deref(),
///     Some("https://shop.example/Widget/dp/CCCCCCCCCC/ref=sr_1?th=1")
/// );
///
/// assert!(rewrite("https://shop.example/s?k=widgets", &sibling).is_none());
/// ```
pub fn rewrite(base_url: &str, identifier: &Identifier) -> Option<String> {
    let range = locate(base_url)?;

    let mut rewritten = String::with_capacity(base_url.len());
    rewritten.push_str(&base_url[..range.start]);
    rewritten.push_str(identifier.as_str());
    rewritten.push_str(&base_url[range.end..]);

    Some(rewritten)
}

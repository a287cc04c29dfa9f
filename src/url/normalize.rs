use crate::UrlError;
use url::Url;

/// Query parameters that only carry click tracking
const TRACKING_PARAMS: &[&str] = &[
    "ref",
    "ref_",
    "content-id",
    "psc",
    "qid",
    "sr",
    "crid",
    "sprefix",
    "fbclid",
    "gclid",
];

/// Query parameter prefixes that only carry click tracking
const TRACKING_PREFIXES: &[&str] = &["utm_", "pd_rd_", "pf_rd_"];

/// Normalizes a catalog URL for frontier deduplication
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject anything but http and https
/// 3. Lowercase the host
/// 4. Normalize path:
///    - Remove empty and dot segments
///    - Drop a trailing `ref=...` tracking segment
///    - Remove trailing slash (except for root /)
/// 5. Remove fragment (everything after #)
/// 6. Remove tracking query parameters
/// 7. Sort remaining query parameters alphabetically
/// 8. Remove empty query string (trailing ?)
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - Failed to parse or normalize the URL
///
/// # Examples
///
/// ```
/// use catalog_ripple::url::normalize_url;
///
/// let url = normalize_url("https://Shop.Example/Mouse/dp/B0ABCDE123/ref=sr_1_1?qid=9&th=1").unwrap();
/// assert_eq!(url.as_str(), "https://shop.example/Mouse/dp/B0ABCDE123?th=1");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    // Step 1: Parse the URL
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    // Step 2: Validate scheme
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    // Step 3: Lowercase the host
    if let Some(host) = url.host_str() {
        let normalized_host = host.to_lowercase();
        url.set_host(Some(&normalized_host))
            .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
    } else {
        return Err(UrlError::MissingDomain);
    }

    // Step 4: Normalize path
    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    // Step 5: Remove fragment
    url.set_fragment(None);

    // Step 6 & 7: Filter and sort query parameters
    if url.query().is_some() {
        let filtered_params = filter_and_sort_query_params(&url);

        // Step 8: Set query or remove if empty
        if filtered_params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(filtered_params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
    }

    Ok(url)
}

/// Key under which the frontier remembers a URL
///
/// Unparseable URLs are keyed by their raw text so they still deduplicate
/// against exact repeats.
pub fn dedup_key(url_str: &str) -> String {
    normalize_url(url_str)
        .map(String::from)
        .unwrap_or_else(|_| url_str.to_string())
}

/// Normalizes a URL path by removing dot segments, tracking segments and
/// trailing slashes
fn normalize_path(path: &str) -> String {
    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments
        .last()
        .is_some_and(|last| last.starts_with("ref="))
    {
        normalized_segments.pop();
    }

    format!("/{}", normalized_segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();

    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key)
        || TRACKING_PREFIXES
            .iter()
            .any(|prefix| key.starts_with(prefix))
}

//! Identifier extraction from URLs, scripts, markup and side-channel payloads
//!
//! Free page text is never scanned. Identifiers are only taken from:
//! - anchored URL shapes (`/dp/<ID>`, `?asin=<ID>`, ...)
//! - the `defaultAsin` field of every value in an embedded variant-dimension map
//! - variant attributes on markup elements
//! - the `ASIN` field of a side-channel JSON payload

use super::pattern::locate;
use super::Identifier;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Script key holding the variant dimension map
pub const VARIANT_DIMENSIONS_KEY: &str = "sortedDimValuesForAllDims";

/// Field of each dimension value that names its default variant
pub const VARIANT_DEFAULT_FIELD: &str = "defaultAsin";

/// Field of a side-channel payload that names a variant
pub const EVENT_ID_FIELD: &str = "ASIN";

/// Attributes that carry a variant identifier on markup elements
const VARIANT_ATTRIBUTES: &[&str] = &["data-asin", "data-defaultasin", "data-dp-url"];

static SCRIPT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").expect("script selector is valid"));

static VARIANT_ELEMENTS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("li[data-asin], li[data-defaultasin], [data-dp-url]")
        .expect("variant selector is valid")
});

/// Finds the first anchored identifier in a URL or text blob
///
/// # Examples
///
/// ```
/// use catalog_ripple::identifier::extract_one;
///
/// let id = extract_one("https://shop.example/Widget/dp/B0ABCDE123?th=1").unwrap();
/// assert_eq!(id.as_str(), "B0ABCDE123");
///
/// assert!(extract_one("SKU B0ABCDE123 ships today").is_none());
/// ```
pub fn extract_one(text: &str) -> Option<Identifier> {
    locate(text).and_then(|range| Identifier::parse(&text[range]))
}

/// Collects every default-variant identifier from an embedded dimension map
///
/// The script body may be a bare JSON document or code embedding the map as
/// `"sortedDimValuesForAllDims": { ... }`. Anything unparseable yields an
/// empty list.
pub fn extract_all_from_script(text: &str) -> Vec<Identifier> {
    let mut found = Vec::new();

    let Some(dimensions) = variant_dimensions(text) else {
        return found;
    };

    for values in dimensions.values() {
        let Some(values) = values.as_array() else {
            continue;
        };

        for value in values {
            let id = value
                .get(VARIANT_DEFAULT_FIELD)
                .and_then(Value::as_str)
                .and_then(identifier_from_field);

            if let Some(id) = id {
                push_unique(&mut found, id);
            }
        }
    }

    found
}

/// Collects identifiers from every variant element in an HTML document
pub fn extract_all_from_markup(html: &str) -> Vec<Identifier> {
    markup_identifiers(&Html::parse_document(html))
}

/// Same as [`extract_all_from_markup`] for an already parsed document
pub fn markup_identifiers(document: &Html) -> Vec<Identifier> {
    let mut found = Vec::new();

    for element in document.select(&VARIANT_ELEMENTS) {
        for attribute in VARIANT_ATTRIBUTES {
            if let Some(id) = element
                .value()
                .attr(attribute)
                .and_then(identifier_from_field)
            {
                push_unique(&mut found, id);
            }
        }
    }

    found
}

/// Runs [`extract_all_from_script`] over every `<script>` in a parsed document
pub fn script_identifiers(document: &Html) -> Vec<Identifier> {
    let mut found = Vec::new();

    for script in document.select(&SCRIPT) {
        let text = script.text().collect::<String>();
        for id in extract_all_from_script(&text) {
            push_unique(&mut found, id);
        }
    }

    found
}

/// Reads the identifier field of a side-channel JSON payload
pub fn extract_from_event(payload: &Value) -> Option<Identifier> {
    payload
        .get(EVENT_ID_FIELD)
        .and_then(Value::as_str)
        .and_then(identifier_from_field)
}

/// Accepts a structured field that is exactly an identifier, or that holds an
/// anchored URL shape
fn identifier_from_field(value: &str) -> Option<Identifier> {
    Identifier::parse(value.trim()).or_else(|| extract_one(value))
}

fn push_unique(found: &mut Vec<Identifier>, id: Identifier) {
    if !found.contains(&id) {
        found.push(id);
    }
}

fn variant_dimensions(text: &str) -> Option<Map<String, Value>> {
    if !text.contains(VARIANT_DIMENSIONS_KEY) {
        return None;
    }

    // Whole script body is a JSON document
    if let Ok(document) = serde_json::from_str::<Value>(text.trim()) {
        if let Some(map) = document.get(VARIANT_DIMENSIONS_KEY).and_then(Value::as_object) {
            return Some(map.clone());
        }
    }

    // Map embedded in script code
    let quoted_key = format!("\"{}\"", VARIANT_DIMENSIONS_KEY);
    let key_at = text.find(&quoted_key)?;
    let after_key = text[key_at + quoted_key.len()..].trim_start();
    let object = after_key.strip_prefix(':')?.trim_start();
    if !object.starts_with('{') {
        return None;
    }

    let mut stream = serde_json::Deserializer::from_str(object).into_iter::<Value>();
    match stream.next() {
        Some(Ok(Value::Object(map))) => Some(map),
        _ => None,
    }
}

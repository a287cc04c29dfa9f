//! Product identifier handling
//!
//! This module owns everything that knows what a product identifier looks like:
//! - The `Identifier` newtype (10 uppercase alphanumeric characters)
//! - The anchored URL pattern shared by extraction and rewriting
//! - Extraction from URLs, embedded variant scripts, markup attributes and
//!   side-channel payloads
//! - Rewriting a known-good product URL to point at a sibling identifier

mod extract;
mod pattern;
mod rewrite;

use std::fmt;

pub use extract::{
    extract_all_from_markup, extract_all_from_script, extract_from_event, extract_one,
    markup_identifiers, script_identifiers, EVENT_ID_FIELD, VARIANT_DEFAULT_FIELD,
    VARIANT_DIMENSIONS_KEY,
};
pub use pattern::IDENTIFIER_LEN;
pub use rewrite::rewrite;

/// A product variant identifier
///
/// Construction always goes through [`Identifier::parse`] or the anchored
/// extractors, so a value of this type is known to be well formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// Parses a string that must be exactly one identifier
    ///
    /// Matching is case-sensitive: lowercase bodies are rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// use catalog_ripple::identifier::Identifier;
    ///
    /// assert!(Identifier::parse("B0C1234XYZ").is_some());
    /// assert!(Identifier::parse("b0c1234xyz").is_none());
    /// assert!(Identifier::parse("B0C1234").is_none());
    /// ```
    pub fn parse(value: &str) -> Option<Self> {
        if pattern::is_identifier_body(value) {
            Some(Self(value.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

//! Page extraction
//!
//! Product detail pages are turned into [`ProductFields`] by an
//! [`Extractor`]; listing pages are parsed into tiles and a next-page link by
//! [`parse_listing`].

mod listing;
mod product;

pub use listing::{parse_listing, ListingPage, ListingTile};
pub use product::SelectorExtractor;

use serde::{Deserialize, Serialize};

/// Product data scraped from a detail page
///
/// Missing fields are empty rather than absent so records always carry the
/// same shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFields {
    pub title: String,
    /// Price as displayed, `whole.fraction`
    pub price: String,
    /// Star rating text, e.g. `4.5 out of 5 stars`
    pub stars: String,
    /// Rating count text, e.g. `1,234 ratings`
    pub rating_count: String,
    /// Overview table rows, cells joined by ` | `
    pub information: Vec<String>,
    pub image_url: String,
}

/// Pulls product fields out of a detail page's HTML
pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str) -> ProductFields;
}

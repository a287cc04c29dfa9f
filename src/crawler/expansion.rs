//! Listing and detail expansion
//!
//! Both run on an already rendered page and never touch the network or the
//! store; they return what the crawl loop should persist and enqueue.

use crate::crawler::{FetchRequest, RequestKind};
use crate::extract::{parse_listing, Extractor};
use crate::identifier::{
    extract_from_event, extract_one, markup_identifiers, rewrite, script_identifiers, Identifier,
};
use crate::render::RenderedPage;
use crate::state::{Claim, VisitedSet};
use crate::storage::ProductRecord;
use scraper::Html;
use url::Url;

/// Follow-up work produced by a listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingExpansion {
    /// One detail request per resolvable tile
    pub details: Vec<FetchRequest>,
    /// The next listing page, if any and within the page cap
    pub next_page: Option<FetchRequest>,
    /// Tiles dropped because their identifier was already claimed
    pub already_claimed: usize,
}

/// Result of expanding one detail page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailExpansion {
    pub record: ProductRecord,
    /// Requests for newly claimed sibling variants
    pub siblings: Vec<FetchRequest>,
    /// Candidates surfaced by all three sources, duplicates included
    pub candidates: usize,
    /// A claim was refused because the claim budget is spent
    pub discovery_halted: bool,
}

/// Expands a rendered listing page
///
/// # Arguments
///
/// * `request` - The listing request that was fetched
/// * `page` - Its rendered page
/// * `visited` - Shared identifier claims; a tile is kept only if this call
///   records its identifier first
/// * `max_listing_pages` - Optional cap on pages followed per category
pub fn expand_listing(
    request: &FetchRequest,
    page: &RenderedPage,
    visited: &VisitedSet,
    max_listing_pages: Option<u32>,
) -> ListingExpansion {
    let base = Url::parse(&page.final_url).or_else(|_| Url::parse(&request.url));
    let Ok(base) = base else {
        tracing::debug!("Cannot resolve links on {}", request.url);
        return ListingExpansion::default();
    };

    let listing = parse_listing(&page.html, &base);

    let mut details = Vec::new();
    let mut already_claimed = 0;
    for tile in listing.tiles {
        if !claim_detail_url(visited, &tile.detail_url) {
            tracing::trace!("Tile {} already claimed", tile.detail_url);
            already_claimed += 1;
            continue;
        }
        details.push(request.detail_from_tile(tile.detail_url, tile.price));
    }

    let next_page = listing
        .next_page
        .map(|url| request.next_listing(url))
        .filter(|next| match (next.kind, max_listing_pages) {
            (RequestKind::Listing { page }, Some(cap)) => page <= cap,
            _ => true,
        });

    ListingExpansion {
        details,
        next_page,
        already_claimed,
    }
}

/// Records the identifier anchored in a detail URL
///
/// Returns `false` only when the identifier is already held. URLs without an
/// anchored identifier rely on URL dedup alone. The claim budget caps variant
/// discovery only, so a detail is still recorded once the budget is spent.
pub(crate) fn claim_detail_url(visited: &VisitedSet, url: &str) -> bool {
    let Some(identifier) = extract_one(url) else {
        return true;
    };
    match visited.claim(&identifier) {
        Claim::Claimed => true,
        Claim::AlreadyClaimed => false,
        Claim::CapacityReached => visited.mark_fetched(&identifier),
    }
}

/// Expands a rendered detail page
///
/// Extracts the record, marks this page's own identifier as fetched, then
/// claims every candidate sibling from side-channel events, embedded scripts
/// and markup, in that order. Only candidates this call wins a claim for are
/// turned into requests, by rewriting the identifier in the page URL.
pub fn expand_detail(
    request: &FetchRequest,
    page: &RenderedPage,
    extractor: &dyn Extractor,
    visited: &VisitedSet,
) -> DetailExpansion {
    let mut fields = extractor.extract(&page.html);
    if fields.price.is_empty() {
        if let Some(price) = &request.fallback_price {
            fields.price = price.clone();
        }
    }

    let identifier = extract_one(&request.url).or_else(|| extract_one(&page.final_url));
    if let Some(identifier) = &identifier {
        visited.mark_fetched(identifier);
    }

    let record = ProductRecord {
        identifier,
        url: page.final_url.clone(),
        category: request.category.clone(),
        referrer: request.referrer.clone(),
        fields,
    };

    let mut expansion = DetailExpansion {
        record,
        siblings: Vec::new(),
        candidates: 0,
        discovery_halted: false,
    };

    // Without an anchored identifier in the URL no sibling URL can be built
    let Some(base) = rewrite_base(request, page) else {
        tracing::debug!("No rewrite anchor in {}; skipping discovery", request.url);
        return expansion;
    };

    let candidates = discover_candidates(page);
    expansion.candidates = candidates.len();

    for candidate in candidates {
        match visited.claim(&candidate) {
            Claim::Claimed => match rewrite(base, &candidate) {
                Some(url) => expansion.siblings.push(request.sibling(url)),
                None => tracing::debug!("Cannot rewrite {} for {}", base, candidate),
            },
            Claim::AlreadyClaimed => {
                tracing::trace!("Variant {} already claimed", candidate);
            }
            Claim::CapacityReached => {
                expansion.discovery_halted = true;
                break;
            }
        }
    }

    tracing::debug!(
        "Detail {}: {} candidates, {} new siblings",
        request.url,
        expansion.candidates,
        expansion.siblings.len()
    );

    expansion
}

/// The URL sibling URLs are built from: the final URL when it carries an
/// anchored identifier, else the requested URL
fn rewrite_base<'a>(request: &'a FetchRequest, page: &'a RenderedPage) -> Option<&'a str> {
    [page.final_url.as_str(), request.url.as_str()]
        .into_iter()
        .find(|url| extract_one(url).is_some())
}

/// Candidate identifiers in discovery order: events, scripts, markup
fn discover_candidates(page: &RenderedPage) -> Vec<Identifier> {
    let mut candidates: Vec<Identifier> = page
        .events
        .iter()
        .filter_map(|event| extract_from_event(&event.payload))
        .collect();

    let document = Html::parse_document(&page.html);
    candidates.extend(script_identifiers(&document));
    candidates.extend(markup_identifiers(&document));

    candidates
}

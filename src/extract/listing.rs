//! Listing (search result) page parsing

use super::product::join_price;
use crate::url::resolve_link;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

static TILES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div[data-asin]").expect("tile selector is valid"));

static TILE_LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[class*=link-normal][href]").expect("tile link selector is valid")
});

static TILE_PRICE_WHOLE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("span.a-price-whole").expect("tile price selector is valid")
});

static TILE_PRICE_FRACTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("span.a-price-fraction").expect("tile price selector is valid")
});

static NEXT_PAGE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[class*=pagination-button][class*=pagination-next][href]")
        .expect("pagination selector is valid")
});

/// One product tile on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingTile {
    /// Absolute URL of the tile's detail page
    pub detail_url: String,
    /// Price shown on the tile, if any
    pub price: Option<String>,
}

/// What a listing page leads to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub tiles: Vec<ListingTile>,
    pub next_page: Option<String>,
}

/// Parses a listing page
///
/// Tiles without a product link are skipped; a tile with several links
/// contributes its first. Duplicate detail URLs on one page are collapsed.
///
/// # Arguments
///
/// * `html` - The listing page HTML
/// * `base_url` - The page URL, for resolving relative links
pub fn parse_listing(html: &str, base_url: &Url) -> ListingPage {
    let document = Html::parse_document(html);
    let mut page = ListingPage::default();

    for tile in document.select(&TILES) {
        let Some(detail_url) = tile
            .select(&TILE_LINK)
            .filter_map(|link| link.value().attr("href"))
            .find_map(|href| resolve_link(href, base_url))
        else {
            continue;
        };

        if page.tiles.iter().any(|known| known.detail_url == detail_url) {
            continue;
        }

        let price = join_price(
            tile_text(tile, &TILE_PRICE_WHOLE),
            tile_text(tile, &TILE_PRICE_FRACTION),
        );

        page.tiles.push(ListingTile { detail_url, price });
    }

    page.next_page = document
        .select(&NEXT_PAGE)
        .filter_map(|link| link.value().attr("href"))
        .find_map(|href| resolve_link(href, base_url));

    page
}

fn tile_text(tile: ElementRef<'_>, selector: &Selector) -> Option<String> {
    tile.select(selector)
        .next()
        .map(|element| element.text().collect::<String>())
}

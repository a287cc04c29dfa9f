use super::{Extractor, ProductFields};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("product selector is valid")
}

static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("span[id*=productTitle]"));
static PRICE_WHOLE: LazyLock<Selector> = LazyLock::new(|| selector("span.a-price-whole"));
static PRICE_FRACTION: LazyLock<Selector> = LazyLock::new(|| selector("span.a-price-fraction"));
static STARS: LazyLock<Selector> = LazyLock::new(|| selector("span.a-icon-alt"));
static RATING_COUNT: LazyLock<Selector> =
    LazyLock::new(|| selector("span#acrCustomerReviewText"));
static OVERVIEW_ROWS: LazyLock<Selector> =
    LazyLock::new(|| selector("div[id*=productOverview_feature] tr"));
static CELLS: LazyLock<Selector> = LazyLock::new(|| selector("th, td"));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("div#imgTagWrapperId > img"));

/// Price that stands for "no price shown"
const ZERO_PRICE: &str = "0.00";

/// CSS-selector based product extractor for catalog detail pages
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorExtractor;

impl SelectorExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for SelectorExtractor {
    fn extract(&self, html: &str) -> ProductFields {
        let document = Html::parse_document(html);

        ProductFields {
            title: first_text(&document, &TITLE).unwrap_or_default(),
            price: extract_price(&document),
            stars: first_text(&document, &STARS).unwrap_or_default(),
            rating_count: first_text(&document, &RATING_COUNT).unwrap_or_default(),
            information: extract_information(&document),
            image_url: document
                .select(&IMAGE)
                .next()
                .and_then(|img| img.value().attr("src"))
                .map(|src| src.trim().to_string())
                .unwrap_or_default(),
        }
    }
}

fn extract_price(document: &Html) -> String {
    join_price(
        first_text(document, &PRICE_WHOLE),
        first_text(document, &PRICE_FRACTION),
    )
    .unwrap_or_default()
}

/// Joins the whole and fraction price parts
///
/// Returns None when no whole part is shown or the price reads `0.00`.
pub(super) fn join_price(whole: Option<String>, fraction: Option<String>) -> Option<String> {
    let whole = whole
        .map(|whole| whole.trim().trim_end_matches('.').to_string())
        .filter(|whole| !whole.is_empty())?;
    let fraction = fraction
        .map(|fraction| fraction.trim().to_string())
        .filter(|fraction| !fraction.is_empty())
        .unwrap_or_else(|| "00".to_string());

    Some(format!("{}.{}", whole, fraction)).filter(|price| price.as_str() != ZERO_PRICE)
}

/// Separator between the cells of one overview row
const CELL_SEPARATOR: &str = " | ";

fn extract_information(document: &Html) -> Vec<String> {
    document
        .select(&OVERVIEW_ROWS)
        .map(|row| {
            let cells: Vec<String> = row
                .select(&CELLS)
                .map(element_text)
                .filter(|text| !text.is_empty())
                .collect();

            if cells.is_empty() {
                // Row without th/td cells: keep its text nodes
                row.text()
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .collect::<Vec<_>>()
                    .join(CELL_SEPARATOR)
            } else {
                cells.join(CELL_SEPARATOR)
            }
        })
        .filter(|row| !row.is_empty())
        .collect()
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL_PAGE: &str = r#"
        <html><body>
            <span id="productTitle">
                Wireless Gaming Mouse
            </span>
            <span class="a-price"><span class="a-price-whole">1,299.</span><span class="a-price-fraction">99</span></span>
            <span class="a-icon-alt">4.6 out of 5 stars</span>
            <span id="acrCustomerReviewText">2,417 ratings</span>
            <div id="productOverview_feature_div">
                <table>
                    <tr><td><span>Brand</span></td><td><span>Acme</span></td></tr>
                    <tr><td><span>Connectivity</span></td><td><span>Wireless</span></td></tr>
                </table>
            </div>
            <div id="imgTagWrapperId"><img src="https://img.shop.example/mouse.jpg" alt=""></div>
        </body></html>
    "#;

    #[test]
    fn test_extract_full_page() {
        let fields = SelectorExtractor::new().extract(DETAIL_PAGE);

        assert_eq!(fields.title, "Wireless Gaming Mouse");
        assert_eq!(fields.price, "1,299.99");
        assert_eq!(fields.stars, "4.6 out of 5 stars");
        assert_eq!(fields.rating_count, "2,417 ratings");
        assert_eq!(
            fields.information,
            vec!["Brand | Acme", "Connectivity | Wireless"]
        );
        assert_eq!(fields.image_url, "https://img.shop.example/mouse.jpg");
    }

    #[test]
    fn test_extract_empty_page() {
        let fields = SelectorExtractor::new().extract("<html><body></body></html>");
        assert_eq!(fields, ProductFields::default());
    }

    #[test]
    fn test_price_without_fraction() {
        let html = r#"<span class="a-price-whole">25.</span>"#;
        assert_eq!(SelectorExtractor::new().extract(html).price, "25.00");
    }

    #[test]
    fn test_zero_price_is_blank() {
        let html = r#"<span class="a-price-whole">0.</span><span class="a-price-fraction">00</span>"#;
        assert_eq!(SelectorExtractor::new().extract(html).price, "");
    }

    #[test]
    fn test_image_must_be_direct_child() {
        let html = r#"<div id="imgTagWrapperId"><a><img src="/nested.jpg"></a></div>"#;
        assert_eq!(SelectorExtractor::new().extract(html).image_url, "");
    }
}

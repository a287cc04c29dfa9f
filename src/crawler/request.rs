use crate::render::WaitCondition;

/// What a fetch request expands into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// A listing page; `page` counts from 1 within its category
    Listing { page: u32 },
    /// A product detail page
    Detail,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listing { .. } => "listing",
            Self::Detail => "detail",
        }
    }
}

/// One unit of work in the frontier
///
/// Retries reuse the same request with `retry_count` bumped; everything else
/// about its identity is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub kind: RequestKind,
    /// Category label the request was seeded under
    pub category: String,
    /// Price shown on the referring listing tile
    pub fallback_price: Option<String>,
    /// Page that led here
    pub referrer: Option<String>,
    /// Failed attempts so far
    pub retry_count: u32,
    /// Discovery depth; seeds are 0
    pub depth: u32,
}

impl FetchRequest {
    /// First listing page of a category
    pub fn listing_seed(category: &str, url: &str) -> Self {
        Self {
            url: url.to_string(),
            kind: RequestKind::Listing { page: 1 },
            category: category.to_string(),
            fallback_price: None,
            referrer: None,
            retry_count: 0,
            depth: 0,
        }
    }

    /// A detail page requested directly, outside any listing
    pub fn detail_seed(category: &str, url: &str) -> Self {
        Self {
            kind: RequestKind::Detail,
            ..Self::listing_seed(category, url)
        }
    }

    /// The listing page that follows this one
    pub fn next_listing(&self, url: String) -> Self {
        let page = match self.kind {
            RequestKind::Listing { page } => page + 1,
            RequestKind::Detail => 1,
        };

        Self {
            url,
            kind: RequestKind::Listing { page },
            category: self.category.clone(),
            fallback_price: None,
            referrer: Some(self.url.clone()),
            retry_count: 0,
            depth: self.depth,
        }
    }

    /// A detail page linked from this listing, with the tile's price
    pub fn detail_from_tile(&self, url: String, price: Option<String>) -> Self {
        Self {
            url,
            kind: RequestKind::Detail,
            category: self.category.clone(),
            fallback_price: price,
            referrer: Some(self.url.clone()),
            retry_count: 0,
            depth: self.depth + 1,
        }
    }

    /// A sibling variant discovered on this detail page
    pub fn sibling(&self, url: String) -> Self {
        self.detail_from_tile(url, None)
    }

    /// Attempts made once the current one finishes
    pub fn attempts(&self) -> u32 {
        self.retry_count + 1
    }

    /// How long a render of this request waits before the page is read
    ///
    /// Listing expansion reads only tile markup and the pagination link, so a
    /// listing is read at DOM content loaded and its background requests are
    /// never issued. Detail pages wait for network idle to collect
    /// side-channel events.
    pub fn wait_condition(&self) -> WaitCondition {
        match self.kind {
            RequestKind::Listing { .. } => WaitCondition::DomContentLoaded,
            RequestKind::Detail => WaitCondition::NetworkIdle,
        }
    }

    pub fn is_detail(&self) -> bool {
        self.kind == RequestKind::Detail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_chain() {
        let seed = FetchRequest::listing_seed("gaming", "https://shop.example/s?k=gaming");
        assert_eq!(seed.kind, RequestKind::Listing { page: 1 });
        assert_eq!(seed.wait_condition(), WaitCondition::DomContentLoaded);

        let next = seed.next_listing("https://shop.example/s?k=gaming&page=2".to_string());
        assert_eq!(next.kind, RequestKind::Listing { page: 2 });
        assert_eq!(next.depth, 0);
        assert_eq!(next.referrer.as_deref(), Some(seed.url.as_str()));
    }

    #[test]
    fn test_detail_from_tile_carries_context() {
        let seed = FetchRequest::listing_seed("gaming", "https://shop.example/s?k=gaming");
        let detail = seed.detail_from_tile(
            "https://shop.example/dp/AAAAAAAAAA".to_string(),
            Some("19.99".to_string()),
        );

        assert!(detail.is_detail());
        assert_eq!(detail.category, "gaming");
        assert_eq!(detail.fallback_price.as_deref(), Some("19.99"));
        assert_eq!(detail.depth, 1);
        assert_eq!(detail.wait_condition(), WaitCondition::NetworkIdle);
    }

    #[test]
    fn test_sibling_drops_fallback_price() {
        let detail = FetchRequest::detail_seed("gaming", "https://shop.example/dp/AAAAAAAAAA");
        let mut with_price = detail.clone();
        with_price.fallback_price = Some("5.00".to_string());

        let sibling = with_price.sibling("https://shop.example/dp/BBBBBBBBBB".to_string());
        assert_eq!(sibling.fallback_price, None);
        assert_eq!(sibling.depth, 1);
        assert_eq!(sibling.retry_count, 0);
    }

    #[test]
    fn test_attempts() {
        let mut request = FetchRequest::detail_seed("gaming", "https://shop.example/dp/AAAAAAAAAA");
        assert_eq!(request.attempts(), 1);
        request.retry_count = 3;
        assert_eq!(request.attempts(), 4);
    }
}

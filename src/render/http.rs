//! Plain HTTP renderer
//!
//! Fetches the document with reqwest. For [`WaitCondition::NetworkIdle`] it
//! then issues the page's same-origin background requests itself (URLs
//! declared in `data-ajax-url`, `<link href>` and `<script src>` that contain
//! `ajax`) and publishes every JSON response as a side-channel event.

use super::{EventHub, FetchError, RenderedPage, Renderer, SideChannelEvent, WaitCondition};
use crate::config::UserAgentConfig;
use crate::url::{resolve_link, same_origin};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

/// Marker a background request URL must contain to be followed
const SIDE_CHANNEL_MARKER: &str = "ajax";

static SIDE_CHANNEL_SOURCES: LazyLock<Vec<(Selector, &'static str)>> = LazyLock::new(|| {
    [
        ("[data-ajax-url]", "data-ajax-url"),
        ("link[href]", "href"),
        ("script[src]", "src"),
    ]
    .into_iter()
    .map(|(selector, attribute)| {
        (
            Selector::parse(selector).expect("side-channel selector is valid"),
            attribute,
        )
    })
    .collect()
});

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use catalog_ripple::config::UserAgentConfig;
/// use catalog_ripple::render::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "CatalogRipple".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(90)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Lists the same-origin background request URLs declared by a document
///
/// URLs are returned in document order, deduplicated, at most `limit` of them.
pub fn side_channel_urls(html: &str, base_url: &Url, limit: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut urls: Vec<String> = Vec::new();

    for (selector, attribute) in SIDE_CHANNEL_SOURCES.iter() {
        for element in document.select(selector) {
            let Some(href) = element.value().attr(attribute) else {
                continue;
            };
            let Some(absolute) = resolve_link(href, base_url) else {
                continue;
            };
            if !absolute.contains(SIDE_CHANNEL_MARKER) || urls.contains(&absolute) {
                continue;
            }
            let same = Url::parse(&absolute)
                .map(|candidate| same_origin(&candidate, base_url))
                .unwrap_or(false);
            if same {
                urls.push(absolute);
            }
        }
    }

    urls.truncate(limit);
    urls
}

/// Renderer backed by a plain HTTP client
pub struct HttpRenderer {
    client: Client,
    hub: EventHub,
    max_side_requests: usize,
}

impl HttpRenderer {
    pub fn new(client: Client, max_side_requests: usize) -> Self {
        Self {
            client,
            hub: EventHub::new(),
            max_side_requests,
        }
    }

    /// The hub side-channel events are published on
    pub fn events(&self) -> &EventHub {
        &self.hub
    }

    /// Fetches a document and checks it is HTML
    ///
    /// # Returns
    ///
    /// * `Ok((final_url, body))` - URL after redirects and the HTML body
    /// * `Err(FetchError)` - Classified failure
    async fn fetch_document(&self, url: &str) -> Result<(String, String), FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_send_error(url, e))?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // Check Content-Type
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !content_type.contains("text/html") {
            return Err(FetchError::ContentMismatch {
                url: url.to_string(),
                content_type,
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok((final_url, body))
    }

    /// Issues one background request; non-JSON or failed responses yield None
    async fn fetch_side_channel(&self, url: &str) -> Option<Value> {
        let response = match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::debug!("Side request {} returned {}", url, response.status());
                return None;
            }
            Err(e) => {
                tracing::debug!("Side request {} failed: {}", url, e);
                return None;
            }
        };

        let body = response.text().await.ok()?;
        match serde_json::from_str::<Value>(&body) {
            Ok(payload) => Some(payload),
            Err(_) => {
                tracing::trace!("Side request {} is not JSON", url);
                None
            }
        }
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render(&self, url: &str, wait: WaitCondition) -> Result<RenderedPage, FetchError> {
        let page = self.hub.open_page();
        let listener = self.hub.attach(page);

        let (final_url, html) = self.fetch_document(url).await?;

        if wait == WaitCondition::NetworkIdle && self.max_side_requests > 0 {
            let side_urls = match Url::parse(&final_url) {
                Ok(base) => side_channel_urls(&html, &base, self.max_side_requests),
                Err(_) => Vec::new(),
            };

            for side_url in side_urls {
                if let Some(payload) = self.fetch_side_channel(&side_url).await {
                    self.hub.publish(
                        page,
                        SideChannelEvent {
                            url: side_url,
                            payload,
                        },
                    );
                }
            }
        }

        let events = listener.drain();
        tracing::debug!(
            "Rendered {} ({} bytes, {} side-channel events)",
            final_url,
            html.len(),
            events.len()
        );

        Ok(RenderedPage {
            final_url,
            html,
            events,
        })
    }
}

fn classify_send_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Network {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&create_test_config(), Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[test]
    fn test_side_channel_urls_filters_origin_and_marker() {
        let html = r#"
            <html><head>
                <link rel="prefetch" href="/ajax/twister?asin=AAAAAAAAAA">
                <link rel="stylesheet" href="/static/site.css">
                <script src="https://cdn.example/ajax/lib.js"></script>
                <script src="/hz/ajax/variant.json"></script>
            </head><body>
                <div data-ajax-url="/ajax/twister?asin=AAAAAAAAAA"></div>
                <div data-ajax-url="/dims/ajax/colors"></div>
            </body></html>
        "#;
        let base = Url::parse("https://shop.example/dp/AAAAAAAAAA").unwrap();

        let urls = side_channel_urls(html, &base, 10);
        assert_eq!(
            urls,
            vec![
                "https://shop.example/ajax/twister?asin=AAAAAAAAAA",
                "https://shop.example/dims/ajax/colors",
                "https://shop.example/hz/ajax/variant.json",
            ]
        );
    }

    #[test]
    fn test_side_channel_urls_respects_limit() {
        let html = r#"
            <div data-ajax-url="/ajax/1"></div>
            <div data-ajax-url="/ajax/2"></div>
            <div data-ajax-url="/ajax/3"></div>
        "#;
        let base = Url::parse("https://shop.example/dp/AAAAAAAAAA").unwrap();

        assert_eq!(side_channel_urls(html, &base, 2).len(), 2);
        assert!(side_channel_urls(html, &base, 0).is_empty());
    }
}

//! Page rendering
//!
//! A [`Renderer`] turns a URL into the page's final HTML plus every JSON
//! side-channel payload observed while the page was live. The crawler only
//! talks to this trait, so tests can substitute scripted renderers and a
//! browser-backed renderer can replace [`HttpRenderer`] without touching the
//! crawl loop.

mod events;
mod http;

pub use events::{EventHub, Listener, SideChannelEvent};
pub use http::{build_http_client, side_channel_urls, HttpRenderer};

use async_trait::async_trait;
use thiserror::Error;

/// When a render is considered done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    /// The document itself has loaded; used for listing pages
    DomContentLoaded,
    /// The document and its background requests have settled; used for
    /// detail pages so side-channel payloads are observed
    NetworkIdle,
}

/// Output of a single render
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    /// URL after redirects
    pub final_url: String,
    /// Final HTML
    pub html: String,
    /// Side-channel payloads seen while the page was attached
    pub events: Vec<SideChannelEvent>,
}

/// Reasons a render failed
///
/// Every variant is treated as transient by the crawler and fed to the retry
/// policy.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Unexpected content type '{content_type}' for {url}")]
    ContentMismatch { url: String, content_type: String },

    #[error("Failed to read body of {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    /// The URL the failed render was for
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::Network { url, .. }
            | Self::HttpStatus { url, .. }
            | Self::ContentMismatch { url, .. }
            | Self::Body { url, .. } => url,
        }
    }
}

/// Loads pages and reports what they emitted
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Renders `url` until `wait` is satisfied
    ///
    /// Implementations must detach any side-channel listener they attached
    /// before returning, and also when the returned future is dropped early.
    async fn render(&self, url: &str, wait: WaitCondition) -> Result<RenderedPage, FetchError>;
}

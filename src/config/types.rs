use serde::Deserialize;

/// Main configuration structure for Catalog-Ripple
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "category")]
    pub categories: Vec<CategoryEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of concurrent renders
    #[serde(rename = "max-concurrent-fetches")]
    pub max_concurrent_fetches: u32,

    /// Retries allowed per request after its first attempt
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base retry delay (milliseconds), doubled per further attempt
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Timeout for one render (milliseconds)
    #[serde(rename = "fetch-timeout-ms", default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Stop claiming new identifiers once this many are known
    #[serde(rename = "max-claimed-identifiers", default)]
    pub max_claimed_identifiers: Option<usize>,

    /// Stop following pagination after this many listing pages per category
    #[serde(rename = "max-listing-pages", default)]
    pub max_listing_pages: Option<u32>,

    /// Background requests issued per detail page
    #[serde(rename = "max-side-requests", default = "default_max_side_requests")]
    pub max_side_requests: usize,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_fetch_timeout_ms() -> u64 {
    90_000
}

fn default_max_side_requests() -> usize {
    8
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// A catalog category and the listing page it starts from
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEntry {
    /// Category label stored on every product found under it
    pub name: String,

    /// First listing page URL
    pub seed: String,
}

//! Crawler module for catalog crawling
//!
//! This module contains the core crawling logic, including:
//! - Fetch requests and their retry policy
//! - The URL-deduplicated frontier
//! - Listing and detail expansion with variant discovery
//! - Overall crawl coordination

mod coordinator;
mod expansion;
mod frontier;
mod request;
mod retry;

pub use coordinator::{run_crawl, Coordinator, CrawlReport, StopHandle};
pub use expansion::{expand_detail, expand_listing, DetailExpansion, ListingExpansion};
pub use frontier::Frontier;
pub use request::{FetchRequest, RequestKind};
pub use retry::{RetryDecision, RetryPolicy};

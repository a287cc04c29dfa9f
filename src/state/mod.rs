//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `FetchState`: lifecycle of an individual fetch request
//! - `VisitedSet`: per-run set of claimed product identifiers, the single
//!   dedup authority for variant discovery

mod fetch_state;
mod visited;

// Re-export main types
pub use fetch_state::FetchState;
pub use visited::{Claim, VisitedSet};

//! Output module for reporting on stored crawl results
//!
//! Backs the `--stats` mode: product counts per category and fetch outcomes
//! of the latest run.

pub mod stats;

pub use stats::{load_statistics, print_statistics, run_duration_seconds, CrawlStatistics};

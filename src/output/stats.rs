//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::state::FetchState;
use crate::storage::{FetchLogEntry, RunRecord, Storage};
use crate::CatalogError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Total number of products stored
    pub total_products: u64,

    /// Product counts per category, sorted by category
    pub products_by_category: Vec<(String, u64)>,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Logged fetch outcomes of the latest run
    pub fetches_by_state: HashMap<FetchState, u64>,

    /// Requests the latest run gave up on
    pub failed_fetches: Vec<FetchLogEntry>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(CatalogError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics, CatalogError> {
    let total_products = storage.count_products()?;
    let products_by_category = storage.count_products_by_category()?;
    let latest_run = storage.get_latest_run()?;

    let mut fetches_by_state = HashMap::new();
    let mut failed_fetches = Vec::new();

    if let Some(run) = &latest_run {
        for state in FetchState::all_states() {
            let count = storage.count_fetches_by_state(run.id, state)?;
            if count > 0 {
                fetches_by_state.insert(state, count);
            }
        }
        failed_fetches = storage.get_failed_fetches(run.id)?;
    }

    Ok(CrawlStatistics {
        total_products,
        products_by_category,
        latest_run,
        fetches_by_state,
        failed_fetches,
    })
}

/// Wall-clock length of a finished run, in seconds
pub fn run_duration_seconds(run: &RunRecord) -> Option<i64> {
    let started = run.started_at.parse::<DateTime<Utc>>().ok()?;
    let finished = run.finished_at.as_ref()?.parse::<DateTime<Utc>>().ok()?;
    Some((finished - started).num_seconds())
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Catalog Statistics ===\n");

    println!("Products: {}", stats.total_products);
    for (category, count) in &stats.products_by_category {
        println!("  {}: {}", category, count);
    }
    println!();

    let Some(run) = &stats.latest_run else {
        println!("No crawl runs recorded");
        return;
    };

    println!("Latest run: #{} ({})", run.id, run.status.to_db_string());
    println!("  Started: {}", run.started_at);
    if let Some(finished) = &run.finished_at {
        println!("  Finished: {}", finished);
    }
    if let Some(seconds) = run_duration_seconds(run) {
        println!("  Duration: {}s", seconds);
    }
    println!();

    println!("Fetches by State:");
    let mut state_counts: Vec<_> = stats.fetches_by_state.iter().collect();
    state_counts.sort_by(|a, b| b.1.cmp(a.1));
    for (state, count) in state_counts {
        println!("  {}: {}", state, count);
    }
    println!();

    if !stats.failed_fetches.is_empty() {
        println!("Dropped Requests ({}):", stats.failed_fetches.len());
        for entry in &stats.failed_fetches {
            println!(
                "  - [{}] {} after {} attempts: {}",
                entry.kind,
                entry.url,
                entry.attempts,
                entry.error_message.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RunStatus, SqliteStorage};

    #[test]
    fn test_load_statistics_empty() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let stats = load_statistics(&storage).unwrap();

        assert_eq!(stats.total_products, 0);
        assert!(stats.latest_run.is_none());
        assert!(stats.fetches_by_state.is_empty());
    }

    #[test]
    fn test_load_statistics_latest_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("hash").unwrap();

        for (url, state) in [
            ("https://shop.example/dp/AAAAAAAAAA", FetchState::Succeeded),
            ("https://shop.example/dp/BBBBBBBBBB", FetchState::Succeeded),
            ("https://shop.example/dp/CCCCCCCCCC", FetchState::Failed),
        ] {
            storage
                .record_fetch(
                    run_id,
                    &FetchLogEntry {
                        url: url.to_string(),
                        kind: "detail".to_string(),
                        category: "gaming".to_string(),
                        state,
                        attempts: 1,
                        depth: 1,
                        error_message: None,
                    },
                )
                .unwrap();
        }

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.latest_run.unwrap().id, run_id);
        assert_eq!(stats.fetches_by_state.get(&FetchState::Succeeded), Some(&2));
        assert_eq!(stats.failed_fetches.len(), 1);
    }

    #[test]
    fn test_run_duration() {
        let mut run = RunRecord {
            id: 1,
            started_at: "2024-05-01T10:00:00+00:00".to_string(),
            finished_at: None,
            config_hash: "hash".to_string(),
            status: RunStatus::Running,
        };
        assert_eq!(run_duration_seconds(&run), None);

        run.finished_at = Some("2024-05-01T10:02:30+00:00".to_string());
        assert_eq!(run_duration_seconds(&run), Some(150));
    }
}

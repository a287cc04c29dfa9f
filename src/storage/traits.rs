//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::FetchState;
use crate::storage::{FetchLogEntry, ProductRecord, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The crawl loop is the only writer; expansion tasks hand records back to it
/// instead of writing themselves.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run, stamping the finish time for any
    /// status other than `Running`
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        self.update_run_status(run_id, RunStatus::Completed)
    }

    // ===== Products =====

    /// Inserts a product, or replaces the stored one with the same key
    ///
    /// # Arguments
    ///
    /// * `run_id` - The run that scraped this record
    /// * `record` - The scraped product
    fn upsert_product(&mut self, run_id: i64, record: &ProductRecord) -> StorageResult<()>;

    /// Gets a product by its key (identifier, or URL when it has none)
    fn get_product(&self, key: &str) -> StorageResult<Option<ProductRecord>>;

    /// Gets total product count
    fn count_products(&self) -> StorageResult<u64>;

    /// Gets product counts per category, sorted by category name
    fn count_products_by_category(&self) -> StorageResult<Vec<(String, u64)>>;

    // ===== Fetch Log =====

    /// Records the final outcome of one request
    fn record_fetch(&mut self, run_id: i64, entry: &FetchLogEntry) -> StorageResult<()>;

    /// Counts logged requests of a run in a given state
    fn count_fetches_by_state(&self, run_id: i64, state: FetchState) -> StorageResult<u64>;

    /// Gets every request of a run that was dropped after exhausting retries
    fn get_failed_fetches(&self, run_id: i64) -> StorageResult<Vec<FetchLogEntry>>;
}

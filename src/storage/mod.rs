//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Product record upserts, keyed by identifier
//! - Per-request fetch outcomes
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::extract::ProductFields;
use crate::identifier::Identifier;
use crate::state::FetchState;

/// A scraped product as handed to the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    /// Identifier taken from the page URL, if it had one
    pub identifier: Option<Identifier>,
    /// Final URL of the detail page
    pub url: String,
    pub category: String,
    /// Page that led to this product (listing or sibling)
    pub referrer: Option<String>,
    pub fields: ProductFields,
}

impl ProductRecord {
    /// Upsert key: the identifier, or the URL for pages without one
    pub fn key(&self) -> &str {
        self.identifier
            .as_ref()
            .map(Identifier::as_str)
            .unwrap_or(&self.url)
    }
}

/// Outcome of one fetch request, as logged per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchLogEntry {
    pub url: String,
    /// `listing` or `detail`
    pub kind: String,
    pub category: String,
    pub state: FetchState,
    pub attempts: u32,
    pub depth: u32,
    pub error_message: Option<String>,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

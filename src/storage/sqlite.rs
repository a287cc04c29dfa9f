//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::extract::ProductFields;
use crate::identifier::Identifier;
use crate::state::FetchState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{FetchLogEntry, ProductRecord, RunRecord, RunStatus};
use crate::CatalogError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status";

const PRODUCT_COLUMNS: &str =
    "identifier, url, category, title, price, stars, rating_count, information, image_url, referrer";

const FETCH_LOG_COLUMNS: &str = "url, kind, category, state, attempts, depth, error_message";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(CatalogError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        // Initialize schema
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

/// Reads a product row; `information` is returned raw for the caller to decode
fn product_from_row(row: &Row<'_>) -> rusqlite::Result<(ProductRecord, String)> {
    let identifier: Option<String> = row.get(0)?;
    let record = ProductRecord {
        identifier: identifier.as_deref().and_then(Identifier::parse),
        url: row.get(1)?,
        category: row.get(2)?,
        referrer: row.get(9)?,
        fields: ProductFields {
            title: row.get(3)?,
            price: row.get(4)?,
            stars: row.get(5)?,
            rating_count: row.get(6)?,
            information: Vec::new(),
            image_url: row.get(8)?,
        },
    };
    Ok((record, row.get(7)?))
}

fn fetch_from_row(row: &Row<'_>) -> rusqlite::Result<FetchLogEntry> {
    Ok(FetchLogEntry {
        url: row.get(0)?,
        kind: row.get(1)?,
        category: row.get(2)?,
        state: FetchState::from_db_string(&row.get::<_, String>(3)?)
            .unwrap_or(FetchState::Failed),
        attempts: row.get(4)?,
        depth: row.get(5)?,
        error_message: row.get(6)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let finished_at = match status {
            RunStatus::Running => None,
            _ => Some(Utc::now().to_rfc3339()),
        };

        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), finished_at, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Products =====

    fn upsert_product(&mut self, run_id: i64, record: &ProductRecord) -> StorageResult<()> {
        let information = serde_json::to_string(&record.fields.information)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO products (product_key, identifier, url, category, title, price, stars,
                                   rating_count, information, image_url, referrer,
                                   first_seen_run, last_seen_run, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12, ?13)
             ON CONFLICT(product_key) DO UPDATE SET
                identifier = excluded.identifier,
                url = excluded.url,
                category = excluded.category,
                title = excluded.title,
                price = excluded.price,
                stars = excluded.stars,
                rating_count = excluded.rating_count,
                information = excluded.information,
                image_url = excluded.image_url,
                referrer = excluded.referrer,
                last_seen_run = excluded.last_seen_run,
                updated_at = excluded.updated_at",
            params![
                record.key(),
                record.identifier.as_ref().map(Identifier::as_str),
                record.url,
                record.category,
                record.fields.title,
                record.fields.price,
                record.fields.stars,
                record.fields.rating_count,
                information,
                record.fields.image_url,
                record.referrer,
                run_id,
                now,
            ],
        )?;

        Ok(())
    }

    fn get_product(&self, key: &str) -> StorageResult<Option<ProductRecord>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM products WHERE product_key = ?1",
                    PRODUCT_COLUMNS
                ),
                params![key],
                product_from_row,
            )
            .optional()?;

        let Some((mut record, information)) = row else {
            return Ok(None);
        };

        record.fields.information = serde_json::from_str(&information)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        Ok(Some(record))
    }

    fn count_products(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_products_by_category(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT category, COUNT(*) FROM products GROUP BY category ORDER BY category",
        )?;

        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    // ===== Fetch Log =====

    fn record_fetch(&mut self, run_id: i64, entry: &FetchLogEntry) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO fetch_log (run_id, url, kind, category, state, attempts, depth,
                                    error_message, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run_id,
                entry.url,
                entry.kind,
                entry.category,
                entry.state.to_db_string(),
                entry.attempts,
                entry.depth,
                entry.error_message,
                now,
            ],
        )?;
        Ok(())
    }

    fn count_fetches_by_state(&self, run_id: i64, state: FetchState) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM fetch_log WHERE run_id = ?1 AND state = ?2",
            params![run_id, state.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_failed_fetches(&self, run_id: i64) -> StorageResult<Vec<FetchLogEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM fetch_log WHERE run_id = ?1 AND state = ?2 ORDER BY id",
            FETCH_LOG_COLUMNS
        ))?;

        let entries = stmt
            .query_map(
                params![run_id, FetchState::Failed.to_db_string()],
                fetch_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

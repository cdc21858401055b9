//! # Finboard Warehouse
//!
//! DuckDB-backed durable store for the most recent ticker snapshot per symbol.
//!
//! The snapshot body is opaque to this crate: callers hand over a JSON payload
//! together with the fields needed for ordering and freshness checks. All values
//! are bound as query parameters.
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `ticker_snapshots` | One row per symbol: fetch/cache timestamps, TTL, JSON payload |
//! | `schema_migrations` | Applied migration versions |

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::ToSql;
use serde::Serialize;
use thiserror::Error;

pub use duckdb::{DuckDbConnectionManager, PooledConnection};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A stored row could not be mapped back into a record.
    #[error("corrupt snapshot row for '{symbol}': {reason}")]
    CorruptRow { symbol: String, reason: String },
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for finboard data.
    pub finboard_home: PathBuf,
    pub db_path: PathBuf,
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::in_home(resolve_finboard_home())
    }
}

impl WarehouseConfig {
    /// Layout rooted at `finboard_home`: `<home>/cache/snapshots.duckdb`.
    pub fn in_home(finboard_home: impl Into<PathBuf>) -> Self {
        let finboard_home = finboard_home.into();
        let db_path = finboard_home.join("cache").join("snapshots.duckdb");
        Self {
            finboard_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// Persisted form of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRecord {
    pub symbol: String,
    /// Provider observation time, epoch seconds.
    pub fetched_at: i64,
    /// Time the entry was written, epoch seconds.
    pub cached_at: i64,
    pub ttl_secs: u64,
    /// Serialized snapshot body.
    pub payload: String,
}

/// The snapshot store.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    pub fn home(&self) -> &Path {
        self.config.finboard_home.as_path()
    }

    /// Insert or replace the row for `record.symbol`.
    pub fn upsert_snapshot(&self, record: &SnapshotRecord) -> Result<(), WarehouseError> {
        let ttl_secs = i64::try_from(record.ttl_secs).unwrap_or(i64::MAX);
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 5] = [
            &record.symbol,
            &record.fetched_at,
            &record.cached_at,
            &ttl_secs,
            &record.payload,
        ];
        connection.execute(
            "INSERT OR REPLACE INTO ticker_snapshots \
             (symbol, fetched_at, cached_at, ttl_secs, payload, updated_at) \
             VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
            params.as_slice(),
        )?;
        Ok(())
    }

    pub fn load_snapshot(&self, symbol: &str) -> Result<Option<SnapshotRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT symbol, fetched_at, cached_at, ttl_secs, payload \
             FROM ticker_snapshots WHERE symbol = ?",
        )?;
        let mut rows = statement.query([symbol])?;
        match rows.next()? {
            Some(row) => Ok(Some(read_record(row)?)),
            None => Ok(None),
        }
    }

    /// All stored snapshots ordered by symbol.
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT symbol, fetched_at, cached_at, ttl_secs, payload \
             FROM ticker_snapshots ORDER BY symbol",
        )?;
        let mut rows = statement.query([] as [&dyn ToSql; 0])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(read_record(row)?);
        }
        Ok(records)
    }

    /// Returns whether a row was removed.
    pub fn delete_snapshot(&self, symbol: &str) -> Result<bool, WarehouseError> {
        let connection = self.manager.acquire()?;
        let removed = connection.execute("DELETE FROM ticker_snapshots WHERE symbol = ?", [symbol])?;
        Ok(removed > 0)
    }

    /// Returns the number of rows removed.
    pub fn clear_snapshots(&self) -> Result<usize, WarehouseError> {
        let connection = self.manager.acquire()?;
        let removed = connection.execute("DELETE FROM ticker_snapshots", [] as [&dyn ToSql; 0])?;
        Ok(removed)
    }

    pub fn snapshot_count(&self) -> Result<usize, WarehouseError> {
        let connection = self.manager.acquire()?;
        let count: i64 =
            connection.query_row("SELECT COUNT(*) FROM ticker_snapshots", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn read_record(row: &::duckdb::Row<'_>) -> Result<SnapshotRecord, WarehouseError> {
    let symbol: String = row.get(0)?;
    let ttl_secs: i64 = row.get(3)?;
    let ttl_secs = u64::try_from(ttl_secs).map_err(|_| WarehouseError::CorruptRow {
        symbol: symbol.clone(),
        reason: format!("negative ttl {ttl_secs}"),
    })?;

    Ok(SnapshotRecord {
        fetched_at: row.get(1)?,
        cached_at: row.get(2)?,
        ttl_secs,
        payload: row.get(4)?,
        symbol,
    })
}

/// `$FINBOARD_HOME`, else `$HOME/.finboard`, else `./.finboard`.
pub fn resolve_finboard_home() -> PathBuf {
    if let Some(path) = env::var_os("FINBOARD_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".finboard");
    }

    PathBuf::from(".finboard")
}

//! Snapshot cache: one entry per symbol, held in memory and optionally written
//! through to a durable [`SnapshotBackend`].

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use finboard_warehouse::{SnapshotRecord, Warehouse, WarehouseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::{Symbol, TickerSnapshot, UtcDateTime, ValidationError};

/// Freshness windows recorded with cache writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub quote_ttl: Duration,
    pub fundamentals_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            quote_ttl: Duration::from_secs(15 * 60),
            fundamentals_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quote_ttl.is_zero() {
            return Err(ValidationError::ZeroConfigValue {
                field: "cache.quote_ttl",
            });
        }
        if self.fundamentals_ttl.is_zero() {
            return Err(ValidationError::ZeroConfigValue {
                field: "cache.fundamentals_ttl",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache entry for '{symbol}' could not be encoded: {reason}")]
    Encoding { symbol: String, reason: String },
}

impl From<WarehouseError> for CacheError {
    fn from(error: WarehouseError) -> Self {
        Self::Unavailable(error.to_string())
    }
}

/// The stored wrapper around a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub symbol: Symbol,
    pub snapshot: TickerSnapshot,
    pub cached_at: UtcDateTime,
    /// Freshness window recorded at write time.
    #[serde(rename = "ttl_secs", with = "duration_secs")]
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(snapshot: TickerSnapshot, cached_at: UtcDateTime, ttl: Duration) -> Self {
        Self {
            symbol: snapshot.symbol.clone(),
            snapshot,
            cached_at,
            ttl,
        }
    }

    pub fn age_at(&self, now: UtcDateTime) -> Duration {
        self.cached_at.age_at(now)
    }

    /// `now - cached_at < ttl`.
    pub fn is_fresh_at(&self, now: UtcDateTime, ttl: Duration) -> bool {
        self.age_at(now) < ttl
    }

    fn to_record(&self) -> Result<SnapshotRecord, CacheError> {
        let payload = serde_json::to_string(&self.snapshot).map_err(|error| CacheError::Encoding {
            symbol: self.symbol.to_string(),
            reason: error.to_string(),
        })?;
        Ok(SnapshotRecord {
            symbol: self.symbol.to_string(),
            fetched_at: self.snapshot.fetched_at.unix_seconds(),
            cached_at: self.cached_at.unix_seconds(),
            ttl_secs: self.ttl.as_secs(),
            payload,
        })
    }

    fn from_record(record: SnapshotRecord) -> Result<Self, CacheError> {
        let encoding = |reason: String| CacheError::Encoding {
            symbol: record.symbol.clone(),
            reason,
        };
        let snapshot: TickerSnapshot =
            serde_json::from_str(&record.payload).map_err(|error| encoding(error.to_string()))?;
        let cached_at = UtcDateTime::from_unix_seconds(record.cached_at)
            .map_err(|error| encoding(error.to_string()))?;
        Ok(Self::new(
            snapshot,
            cached_at,
            Duration::from_secs(record.ttl_secs),
        ))
    }
}

fn newer_entry(entries: &HashMap<Symbol, CacheEntry>, snapshot: &TickerSnapshot) -> Option<CacheEntry> {
    let existing = entries.get(&snapshot.symbol)?;
    if existing.snapshot.fetched_at <= snapshot.fetched_at {
        return None;
    }
    debug!(
        symbol = %snapshot.symbol,
        stored = %existing.snapshot.fetched_at,
        incoming = %snapshot.fetched_at,
        "ignoring out-of-order cache write"
    );
    Some(existing.clone())
}

/// Runs a backend call on the blocking pool.
async fn run_blocking<T, F>(backend: Arc<dyn SnapshotBackend>, call: F) -> Result<T, CacheError>
where
    T: Send + 'static,
    F: FnOnce(&dyn SnapshotBackend) -> Result<T, CacheError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || call(backend.as_ref()))
        .await
        .map_err(|error| CacheError::Unavailable(format!("cache backend task failed: {error}")))?
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Durable storage behind the in-memory cache.
///
/// Implementations are synchronous; calls are short single-row statements.
pub trait SnapshotBackend: Send + Sync {
    fn load(&self, symbol: &Symbol) -> Result<Option<CacheEntry>, CacheError>;
    fn load_all(&self) -> Result<Vec<CacheEntry>, CacheError>;
    fn save(&self, entry: &CacheEntry) -> Result<(), CacheError>;
    fn remove(&self, symbol: &Symbol) -> Result<(), CacheError>;
    fn clear(&self) -> Result<(), CacheError>;
}

impl SnapshotBackend for Warehouse {
    fn load(&self, symbol: &Symbol) -> Result<Option<CacheEntry>, CacheError> {
        self.load_snapshot(symbol.as_str())?
            .map(CacheEntry::from_record)
            .transpose()
    }

    fn load_all(&self) -> Result<Vec<CacheEntry>, CacheError> {
        self.list_snapshots()?
            .into_iter()
            .map(CacheEntry::from_record)
            .collect()
    }

    fn save(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.upsert_snapshot(&entry.to_record()?)?;
        Ok(())
    }

    fn remove(&self, symbol: &Symbol) -> Result<(), CacheError> {
        self.delete_snapshot(symbol.as_str())?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.clear_snapshots()?;
        Ok(())
    }
}

/// Thread-safe snapshot cache keyed by symbol.
///
/// Reads never fail: a backend error on lookup is logged and treated as a miss.
/// Entries are replaced whole under the write lock, so readers never observe a
/// partially written entry. Backend I/O runs on the blocking pool and never while
/// the map lock is held.
#[derive(Clone)]
pub struct CacheStore {
    entries: Arc<RwLock<HashMap<Symbol, CacheEntry>>>,
    backend: Option<Arc<dyn SnapshotBackend>>,
    /// Serializes backend writes so the durable copy converges on the in-memory one.
    persist: Arc<Mutex<()>>,
    config: CacheConfig,
}

impl Debug for CacheStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("config", &self.config)
            .field("persistent", &self.backend.is_some())
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Memory-only cache.
    pub fn in_memory(config: CacheConfig) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            backend: None,
            persist: Arc::new(Mutex::new(())),
            config,
        }
    }

    /// Cache that writes through to `backend`.
    pub fn with_backend(config: CacheConfig, backend: Arc<dyn SnapshotBackend>) -> Self {
        Self {
            backend: Some(backend),
            ..Self::in_memory(config)
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_persistent(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn get(&self, symbol: &Symbol) -> Option<CacheEntry> {
        if let Some(entry) = self.entries.read().await.get(symbol) {
            return Some(entry.clone());
        }

        let backend = self.backend.clone()?;
        let key = symbol.clone();
        match run_blocking(backend, move |backend| backend.load(&key)).await {
            Ok(Some(entry)) => {
                debug!(symbol = %symbol, "hydrated cache entry from backend");
                self.restore(entry.clone()).await;
                Some(entry)
            }
            Ok(None) => None,
            Err(error) => {
                warn!(symbol = %symbol, error = %error, "cache backend read failed; treating as miss");
                None
            }
        }
    }

    /// Store `snapshot` with `cached_at = now`.
    ///
    /// A snapshot older than the stored one is ignored so `fetched_at` never moves
    /// backwards. The in-memory entry is written even when the backend fails; the
    /// failure is reported as [`CacheError::Unavailable`].
    pub async fn put(&self, snapshot: TickerSnapshot) -> Result<CacheEntry, CacheError> {
        let entry = {
            let mut entries = self.entries.write().await;
            if let Some(existing) = newer_entry(&entries, &snapshot) {
                return Ok(existing);
            }
            let entry = CacheEntry::new(snapshot, UtcDateTime::now(), self.config.quote_ttl);
            entries.insert(entry.symbol.clone(), entry.clone());
            entry
        };

        self.persist(&entry.symbol).await?;
        Ok(entry)
    }

    /// Replace the stored snapshot without restarting its freshness clock.
    ///
    /// Keeps the existing `cached_at` and `ttl`; behaves like [`put`](Self::put)
    /// when the symbol has no entry yet.
    pub async fn amend(&self, snapshot: TickerSnapshot) -> Result<CacheEntry, CacheError> {
        let entry = {
            let mut entries = self.entries.write().await;
            if let Some(existing) = newer_entry(&entries, &snapshot) {
                return Ok(existing);
            }
            let entry = match entries.get(&snapshot.symbol) {
                Some(existing) => CacheEntry::new(snapshot, existing.cached_at, existing.ttl),
                None => CacheEntry::new(snapshot, UtcDateTime::now(), self.config.quote_ttl),
            };
            entries.insert(entry.symbol.clone(), entry.clone());
            entry
        };

        self.persist(&entry.symbol).await?;
        Ok(entry)
    }

    /// Writes the current in-memory entry for `symbol` to the backend.
    ///
    /// Reads the entry after taking the persist lock, so a slower writer never
    /// overwrites a newer snapshot on disk with its own older one.
    async fn persist(&self, symbol: &Symbol) -> Result<(), CacheError> {
        let Some(backend) = self.backend.clone() else {
            return Ok(());
        };

        let _serial = self.persist.lock().await;
        let Some(entry) = self.entries.read().await.get(symbol).cloned() else {
            return Ok(());
        };

        run_blocking(backend, move |backend| backend.save(&entry))
            .await
            .map_err(|error| {
                warn!(symbol = %symbol, error = %error, "cache backend write failed");
                match error {
                    CacheError::Unavailable(_) => error,
                    other => CacheError::Unavailable(other.to_string()),
                }
            })
    }

    /// Insert an entry as-is, keeping its original `cached_at`.
    ///
    /// Used for hydration from storage; never overwrites a newer snapshot.
    pub async fn restore(&self, entry: CacheEntry) {
        let mut entries = self.entries.write().await;
        let newer_present = entries
            .get(&entry.symbol)
            .is_some_and(|existing| existing.snapshot.fetched_at > entry.snapshot.fetched_at);
        if !newer_present {
            entries.insert(entry.symbol.clone(), entry);
        }
    }

    pub async fn is_fresh(&self, symbol: &Symbol, ttl: Duration) -> bool {
        self.is_fresh_at(symbol, ttl, UtcDateTime::now()).await
    }

    pub async fn is_fresh_at(&self, symbol: &Symbol, ttl: Duration, now: UtcDateTime) -> bool {
        self.get(symbol)
            .await
            .is_some_and(|entry| entry.is_fresh_at(now, ttl))
    }

    /// Evict one symbol, or everything when `symbol` is `None`.
    ///
    /// The backend is cleared first; when it fails, memory is left untouched so
    /// both copies still agree.
    pub async fn clear(&self, symbol: Option<&Symbol>) -> Result<usize, CacheError> {
        let _serial = self.persist.lock().await;

        if let Some(backend) = self.backend.clone() {
            let key = symbol.cloned();
            run_blocking(backend, move |backend| match &key {
                Some(symbol) => backend.remove(symbol),
                None => backend.clear(),
            })
            .await?;
        }

        let mut entries = self.entries.write().await;
        let removed = match symbol {
            Some(symbol) => usize::from(entries.remove(symbol).is_some()),
            None => {
                let count = entries.len();
                entries.clear();
                count
            }
        };
        Ok(removed)
    }

    /// Pull every persisted entry into memory; returns how many were loaded.
    pub async fn load_persisted(&self) -> Result<usize, CacheError> {
        let Some(backend) = self.backend.clone() else {
            return Ok(0);
        };

        let persisted = run_blocking(backend, |backend| backend.load_all()).await?;
        let count = persisted.len();
        for entry in persisted {
            self.restore(entry).await;
        }
        Ok(count)
    }

    /// In-memory entries ordered by symbol.
    pub async fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<_> = self.entries.read().await.values().cloned().collect();
        entries.sort_by(|left, right| left.symbol.cmp(&right.symbol));
        entries
    }

    pub async fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<_> = self.entries.read().await.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

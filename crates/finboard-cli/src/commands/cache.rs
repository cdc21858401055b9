use finboard_core::{CacheEntry, DataCollector, UtcDateTime};
use serde::Serialize;
use serde_json::json;

use crate::cli::ClearArgs;
use crate::error::CliError;

use super::{parse_symbol, CommandResult};

#[derive(Debug, Serialize)]
struct CacheEntryStatus {
    symbol: String,
    fetched_at: UtcDateTime,
    cached_at: UtcDateTime,
    age_secs: u64,
    ttl_secs: u64,
    fresh: bool,
    has_fundamentals: bool,
    has_indicators: bool,
}

impl CacheEntryStatus {
    fn new(entry: &CacheEntry, now: UtcDateTime) -> Self {
        Self {
            symbol: entry.symbol.to_string(),
            fetched_at: entry.snapshot.fetched_at,
            cached_at: entry.cached_at,
            age_secs: entry.age_at(now).as_secs(),
            ttl_secs: entry.ttl.as_secs(),
            fresh: entry.is_fresh_at(now, entry.ttl),
            has_fundamentals: entry.snapshot.fundamentals_as_of.is_some(),
            has_indicators: entry.snapshot.technical_indicators.is_some(),
        }
    }
}

pub async fn status(collector: &DataCollector) -> Result<CommandResult, CliError> {
    let cache = collector.cache();
    cache.load_persisted().await?;

    let now = UtcDateTime::now();
    let entries: Vec<_> = cache
        .entries()
        .await
        .iter()
        .map(|entry| CacheEntryStatus::new(entry, now))
        .collect();

    Ok(CommandResult::ok(json!({
        "persistent": cache.is_persistent(),
        "count": entries.len(),
        "entries": entries,
    })))
}

pub async fn clear(args: &ClearArgs, collector: &DataCollector) -> Result<CommandResult, CliError> {
    let symbol = args.symbol.as_deref().map(parse_symbol).transpose()?;

    let cache = collector.cache();
    cache.load_persisted().await?;
    let removed = cache.clear(symbol.as_ref()).await?;

    Ok(CommandResult::ok(json!({
        "symbol": symbol.map(|symbol| symbol.to_string()),
        "removed": removed,
    })))
}

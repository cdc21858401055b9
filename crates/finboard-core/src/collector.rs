//! # Data Collector
//!
//! Orchestrates cache, rate limiter, retry policy and provider for each symbol.
//!
//! ```text
//! CheckCache --fresh--------------------------------------> CacheHit
//!     |
//!     +--miss / force_refresh--> Throttle -> Fetch --ok----> FreshFetch
//!                                              |
//!                                              +--failed--> Fallback --cached--> StaleFallback
//!                                                                  \--none----> HardFailure
//! ```
//!
//! `InvalidTicker` bypasses the fallback: a symbol the provider does not know is
//! reported immediately even when an older entry exists.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::cache::{CacheEntry, CacheStore};
use crate::config::CollectorConfig;
use crate::indicators::compute_indicators;
use crate::provider::{MarketDataProvider, ProviderError, ProviderErrorKind, ProviderFuture};
use crate::retry::{FetchAttempt, RetryFailure, RetryPolicy, RetryReport};
use crate::throttling::RateLimiter;
use crate::{
    HistoryPeriod, PriceHistory, Symbol, TechnicalIndicators, TickerSnapshot, UtcDateTime,
    ValidationError,
};

/// How a snapshot was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchStatus {
    CacheHit,
    FreshFetch,
    /// The provider failed terminally; the last cached snapshot is returned instead.
    StaleFallback { reason: String },
}

/// Result of one per-symbol fetch.
#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub snapshot: TickerSnapshot,
    #[serde(flatten)]
    pub status: FetchStatus,
    /// Quote attempts made for this outcome; empty on a cache hit.
    pub attempts: Vec<FetchAttempt>,
    /// Attempts of the fundamentals refresh; empty when the cached block was reused.
    pub fundamentals_attempts: Vec<FetchAttempt>,
    /// The snapshot could not be written to the durable cache.
    pub cache_degraded: bool,
}

impl FetchOutcome {
    fn cache_hit(entry: CacheEntry) -> Self {
        Self {
            snapshot: entry.snapshot,
            status: FetchStatus::CacheHit,
            attempts: Vec::new(),
            fundamentals_attempts: Vec::new(),
            cache_degraded: false,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self.status, FetchStatus::StaleFallback { .. })
    }
}

/// Price series together with the attempts it took.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryOutcome {
    pub history: PriceHistory,
    pub attempts: Vec<FetchAttempt>,
}

#[derive(Debug, Clone, Error)]
pub enum CollectorError {
    #[error("unknown ticker '{symbol}'")]
    InvalidTicker {
        symbol: Symbol,
        attempts: Vec<FetchAttempt>,
    },

    /// Retries exhausted (or a non-retryable failure) and nothing cached to fall back on.
    #[error("fetch for '{symbol}' failed: {last_error}")]
    HardFailure {
        symbol: Symbol,
        last_error: ProviderError,
        attempts: Vec<FetchAttempt>,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl CollectorError {
    fn from_failure(symbol: &Symbol, failure: RetryFailure) -> Self {
        match failure.kind() {
            ProviderErrorKind::InvalidTicker => Self::InvalidTicker {
                symbol: symbol.clone(),
                attempts: failure.attempts,
            },
            _ => Self::HardFailure {
                symbol: symbol.clone(),
                last_error: failure.error,
                attempts: failure.attempts,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTicker { .. } => "collector.invalid_ticker",
            Self::HardFailure { .. } => "collector.hard_failure",
            Self::Validation(_) => "validation",
        }
    }

    pub fn attempts(&self) -> &[FetchAttempt] {
        match self {
            Self::InvalidTicker { attempts, .. } | Self::HardFailure { attempts, .. } => attempts,
            Self::Validation(_) => &[],
        }
    }
}

struct MemoizedIndicators {
    history_len: usize,
    last_ts: Option<UtcDateTime>,
    indicators: TechnicalIndicators,
}

struct CollectorInner {
    provider: Arc<dyn MarketDataProvider>,
    cache: CacheStore,
    limiter: RateLimiter,
    retry: RetryPolicy,
    config: CollectorConfig,
    indicator_memo: Mutex<HashMap<Symbol, MemoizedIndicators>>,
}

/// Cheaply cloneable handle; clones share the cache, limiter and indicator memo.
#[derive(Clone)]
pub struct DataCollector {
    inner: Arc<CollectorInner>,
}

impl std::fmt::Debug for DataCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCollector")
            .field("provider", &self.inner.provider.name())
            .field("cache", &self.inner.cache)
            .field("limiter", &self.inner.limiter)
            .finish_non_exhaustive()
    }
}

impl DataCollector {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        cache: CacheStore,
        config: CollectorConfig,
    ) -> Result<Self, ValidationError> {
        let limiter = RateLimiter::new(config.rate_limit);
        Self::with_rate_limiter(provider, cache, limiter, config)
    }

    /// Builds a collector admitted through an existing `limiter`, so several
    /// collectors can share one request budget.
    pub fn with_rate_limiter(
        provider: Arc<dyn MarketDataProvider>,
        cache: CacheStore,
        limiter: RateLimiter,
        config: CollectorConfig,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(CollectorInner {
                provider,
                cache,
                limiter,
                retry: RetryPolicy::new(config.retry),
                config,
                indicator_memo: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn cache(&self) -> &CacheStore {
        &self.inner.cache
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.inner.config
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    pub fn provider_name(&self) -> &'static str {
        self.inner.provider.name()
    }

    /// Latest snapshot for `symbol`, from cache when fresh unless `force_refresh`.
    pub async fn fetch_quote(
        &self,
        symbol: &Symbol,
        force_refresh: bool,
    ) -> Result<FetchOutcome, CollectorError> {
        let span = info_span!("fetch_quote", symbol = %symbol, force_refresh);
        self.run_quote_machine(symbol, force_refresh).instrument(span).await
    }

    async fn run_quote_machine(
        &self,
        symbol: &Symbol,
        force_refresh: bool,
    ) -> Result<FetchOutcome, CollectorError> {
        let cached = self.inner.cache.get(symbol).await;

        if !force_refresh {
            if let Some(entry) = cached.as_ref() {
                if entry.is_fresh_at(UtcDateTime::now(), self.inner.config.cache.quote_ttl) {
                    debug!(cached_at = %entry.cached_at, "cache hit");
                    return Ok(FetchOutcome::cache_hit(entry.clone()));
                }
            }
        }

        match self.call_provider(|provider| provider.fetch_quote(symbol)).await {
            Ok(report) => Ok(self.store_fresh(symbol, report, cached.as_ref()).await),
            Err(failure) => self.fall_back(symbol, failure).await,
        }
    }

    async fn store_fresh(
        &self,
        symbol: &Symbol,
        report: RetryReport<TickerSnapshot>,
        previous: Option<&CacheEntry>,
    ) -> FetchOutcome {
        let (snapshot, fundamentals_attempts) = self.refresh_fundamentals(symbol, report.value, previous).await;

        let (snapshot, cache_degraded) = match self.inner.cache.put(snapshot.clone()).await {
            Ok(entry) => (entry.snapshot, false),
            Err(error) => {
                warn!(error = %error, "serving fresh snapshot without durable cache");
                (snapshot, true)
            }
        };

        info!(attempts = report.attempts.len(), "fetched fresh snapshot");
        FetchOutcome {
            snapshot,
            status: FetchStatus::FreshFetch,
            attempts: report.attempts,
            fundamentals_attempts,
            cache_degraded,
        }
    }

    /// Attaches the revenue/net-income block: the cached one while younger than
    /// `fundamentals_ttl`, otherwise a fresh fetch. A failed fetch keeps the cached
    /// block, or none.
    async fn refresh_fundamentals(
        &self,
        symbol: &Symbol,
        snapshot: TickerSnapshot,
        previous: Option<&CacheEntry>,
    ) -> (TickerSnapshot, Vec<FetchAttempt>) {
        let cached_block = previous.and_then(|entry| entry.snapshot.fundamentals());
        let now = UtcDateTime::now();
        if let Some(block) = cached_block.as_ref() {
            if block.as_of.age_at(now) < self.inner.config.cache.fundamentals_ttl {
                debug!(as_of = %block.as_of, "reusing cached fundamentals");
                return (snapshot.with_fundamentals(block.clone()), Vec::new());
            }
        }

        match self
            .call_provider(|provider| provider.fetch_fundamentals(symbol))
            .await
        {
            Ok(report) => (snapshot.with_fundamentals(report.value), report.attempts),
            Err(failure) => {
                warn!(error = %failure.error, "fundamentals refresh failed; keeping previous block");
                let snapshot = match cached_block {
                    Some(block) => snapshot.with_fundamentals(block),
                    None => snapshot,
                };
                (snapshot, failure.attempts)
            }
        }
    }

    async fn fall_back(&self, symbol: &Symbol, failure: RetryFailure) -> Result<FetchOutcome, CollectorError> {
        if failure.kind() == ProviderErrorKind::InvalidTicker {
            warn!(error = %failure.error, "provider rejected ticker");
            return Err(CollectorError::from_failure(symbol, failure));
        }

        // Re-read: a concurrent fetch may have stored something newer meanwhile.
        match self.inner.cache.get(symbol).await {
            Some(entry) => {
                warn!(
                    cached_at = %entry.cached_at,
                    error = %failure.error,
                    "serving stale snapshot after fetch failure"
                );
                Ok(FetchOutcome {
                    snapshot: entry.snapshot,
                    status: FetchStatus::StaleFallback {
                        reason: failure.error.to_string(),
                    },
                    attempts: failure.attempts,
                    fundamentals_attempts: Vec::new(),
                    cache_degraded: false,
                })
            }
            None => {
                error!(error = %failure.error, attempts = failure.attempts.len(), "fetch failed with no cached fallback");
                Err(CollectorError::from_failure(symbol, failure))
            }
        }
    }

    /// Price series for `symbol`; throttled and retried like quotes, never cached.
    pub async fn fetch_history(
        &self,
        symbol: &Symbol,
        period: HistoryPeriod,
    ) -> Result<HistoryOutcome, CollectorError> {
        let span = info_span!("fetch_history", symbol = %symbol, period = %period);
        async {
            let report = self
                .call_provider(|provider| provider.fetch_history(symbol, period))
                .await
                .map_err(|failure| {
                    warn!(error = %failure.error, "history fetch failed");
                    CollectorError::from_failure(symbol, failure)
                })?;
            debug!(bars = report.value.len(), "fetched history");
            Ok::<_, CollectorError>(HistoryOutcome {
                history: report.value,
                attempts: report.attempts,
            })
        }
        .instrument(span)
        .await
    }

    /// Quote plus indicators computed from a fresh `period` history.
    ///
    /// A fresh cache hit that already carries indicators is returned as-is, without
    /// fetching history; `force_refresh` recomputes them. The indicators are written back to the cache without restarting the entry's
    /// freshness clock. A failed history fetch leaves the snapshot's previous
    /// indicators in place.
    pub async fn fetch_with_indicators(
        &self,
        symbol: &Symbol,
        period: HistoryPeriod,
        force_refresh: bool,
    ) -> Result<FetchOutcome, CollectorError> {
        let mut outcome = self.fetch_quote(symbol, force_refresh).await?;
        if outcome.status == FetchStatus::CacheHit && outcome.snapshot.technical_indicators.is_some() {
            debug!(symbol = %symbol, "serving cached indicators");
            return Ok(outcome);
        }

        let history = match self.fetch_history(symbol, period).await {
            Ok(history) => history.history,
            Err(error) => {
                warn!(symbol = %symbol, error = %error, "indicators not refreshed");
                return Ok(outcome);
            }
        };

        let indicators = self.indicators_for(&history)?;
        let snapshot = outcome.snapshot.clone().with_indicators(indicators);
        outcome.snapshot = match self.inner.cache.amend(snapshot.clone()).await {
            Ok(entry) => entry.snapshot,
            Err(error) => {
                warn!(symbol = %symbol, error = %error, "indicators not persisted");
                outcome.cache_degraded = true;
                snapshot
            }
        };
        Ok(outcome)
    }

    /// Indicators for `history`, memoized per symbol on (length, last bar).
    pub fn indicators_for(&self, history: &PriceHistory) -> Result<TechnicalIndicators, ValidationError> {
        let history_len = history.len();
        let last_ts = history.last_ts();

        if let Some(memo) = self.memo().get(&history.symbol) {
            if memo.history_len == history_len && memo.last_ts == last_ts {
                debug!(symbol = %history.symbol, "indicator memo hit");
                return Ok(memo.indicators.clone());
            }
        }

        let indicators = compute_indicators(history, &self.inner.config.indicators)?;
        self.memo().insert(
            history.symbol.clone(),
            MemoizedIndicators {
                history_len,
                last_ts,
                indicators: indicators.clone(),
            },
        );
        Ok(indicators)
    }

    /// Runs the quote machine for every distinct symbol concurrently.
    ///
    /// Per-symbol failures are reported in the map; the batch itself never fails.
    pub async fn fetch_many<I>(
        &self,
        symbols: I,
        force_refresh: bool,
    ) -> BTreeMap<Symbol, Result<FetchOutcome, CollectorError>>
    where
        I: IntoIterator<Item = Symbol>,
    {
        let requested: BTreeSet<Symbol> = symbols.into_iter().collect();
        let mut tasks = JoinSet::new();
        for symbol in requested.iter().cloned() {
            let collector = self.clone();
            tasks.spawn(async move {
                let outcome = collector.fetch_quote(&symbol, force_refresh).await;
                (symbol, outcome)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((symbol, outcome)) => {
                    results.insert(symbol, outcome);
                }
                Err(join_error) => error!(error = %join_error, "fetch task aborted"),
            }
        }

        for symbol in requested {
            results.entry(symbol.clone()).or_insert_with(|| {
                Err(CollectorError::HardFailure {
                    symbol,
                    last_error: ProviderError::internal("fetch task aborted"),
                    attempts: Vec::new(),
                })
            });
        }
        results
    }

    async fn call_provider<'a, T, F>(&'a self, call: F) -> Result<RetryReport<T>, RetryFailure>
    where
        F: Fn(&'a dyn MarketDataProvider) -> ProviderFuture<'a, T>,
    {
        let provider: &'a dyn MarketDataProvider = self.inner.provider.as_ref();
        self.inner
            .retry
            .execute_throttled(&self.inner.limiter, |_| call(provider))
            .await
    }

    fn memo(&self) -> MutexGuard<'_, HashMap<Symbol, MemoizedIndicators>> {
        self.inner
            .indicator_memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

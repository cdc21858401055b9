//! # Finboard Core
//!
//! Market-data collection and caching engine for the finboard dashboard.
//!
//! ## Overview
//!
//! This crate fetches ticker data from an unreliable, rate-limited upstream API,
//! normalizes it, decides when cached data is fresh enough to reuse, retries
//! transient failures with backoff and falls back to stale data when the upstream
//! is down.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Per-symbol snapshot cache with optional DuckDB write-through |
//! | [`collector`] | Per-symbol fetch state machine and batch fetching |
//! | [`config`] | Collector configuration and `FINBOARD_*` overrides |
//! | [`domain`] | Domain models (snapshot, history, indicators, symbol) |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`indicators`] | RSI, MACD and SMA computation |
//! | [`provider`] | Provider trait and the Yahoo Finance implementation |
//! | [`retry`] | Exponential backoff retry policy |
//! | [`throttling`] | Token-bucket rate limiter |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │  DataCollector  │────▶│   CacheStore     │──▶ Warehouse (DuckDB)
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  RateLimiter    │────▶│  RetryPolicy     │
//! └─────────────────┘     └────────┬─────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ MarketData      │────▶│ HTTP Client      │
//! │ Provider        │     │ (reqwest)        │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use finboard_core::{CacheStore, CollectorConfig, DataCollector, ReqwestHttpClient, Symbol, YahooProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CollectorConfig::from_env()?;
//!     let provider = YahooProvider::new(Arc::new(ReqwestHttpClient::new()?));
//!     let collector = DataCollector::new(Arc::new(provider), CacheStore::in_memory(config.cache), config)?;
//!
//!     let outcome = collector.fetch_quote(&Symbol::parse("AAPL")?, false).await?;
//!     println!("{:?}", outcome.snapshot.current_price);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use finboard_core::{CollectorError, ProviderErrorKind};
//!
//! fn describe(error: &CollectorError) -> &'static str {
//!     match error {
//!         CollectorError::InvalidTicker { .. } => "unknown symbol",
//!         CollectorError::HardFailure { last_error, .. } if last_error.kind() == ProviderErrorKind::RateLimited => {
//!             "upstream is throttling"
//!         }
//!         CollectorError::HardFailure { .. } => "upstream unavailable",
//!         CollectorError::Validation(_) => "bad input",
//!     }
//! }
//! ```

pub mod cache;
pub mod collector;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod indicators;
pub mod provider;
pub mod retry;
pub mod throttling;

// Caching
pub use cache::{CacheConfig, CacheEntry, CacheError, CacheStore, SnapshotBackend};

// Collector
pub use collector::{CollectorError, DataCollector, FetchOutcome, FetchStatus, HistoryOutcome};

// Configuration
pub use config::CollectorConfig;

// Domain models
pub use domain::{
    decimal_from_f64, Fundamentals, HistoryPeriod, Macd, MovingAverage, PeriodValue, PriceBar,
    PriceHistory, Symbol, TechnicalIndicators, TickerSnapshot, UtcDateTime,
};

// Error types
pub use error::ValidationError;

// Warehouse (re-exported from finboard-warehouse)
pub use finboard_warehouse::{Warehouse, WarehouseConfig, WarehouseError};

// HTTP client types
pub use http_client::{HttpClient, HttpError, HttpErrorKind, HttpFuture, HttpRequest, HttpResponse, ReqwestHttpClient};

// Indicators
pub use indicators::{compute_from_closes, compute_indicators, IndicatorConfig};

// Providers
pub use provider::{MarketDataProvider, ProviderError, ProviderErrorKind, ProviderFuture, YahooProvider, YahooSession};

// Retry logic
pub use retry::{AttemptOutcome, Backoff, FetchAttempt, RetryConfig, RetryFailure, RetryPolicy, RetryReport};

// Throttling
pub use throttling::{RateLimitConfig, RateLimiter};

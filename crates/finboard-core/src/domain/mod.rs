//! # Domain Models
//!
//! Canonical domain types for finboard market data.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TickerSnapshot`] | Latest quote and fundamentals for a symbol |
//! | [`Fundamentals`] | Quarterly revenue / net income block |
//! | [`PriceBar`] | OHLCV observation |
//! | [`PriceHistory`] | Ordered bars for a symbol and period |
//! | [`TechnicalIndicators`] | RSI, MACD and SMA analytics |
//! | [`Symbol`] | Validated ticker symbol |
//! | [`HistoryPeriod`] | Allowed history lookback tokens |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Construction validates invariants; provider fields the upstream did not send
//! are `None`, never a default.

mod models;
mod period;
mod symbol;
mod timestamp;

pub use models::{
    decimal_from_f64, Fundamentals, Macd, MovingAverage, PeriodValue, PriceBar, PriceHistory,
    TechnicalIndicators, TickerSnapshot,
};
pub use period::HistoryPeriod;
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{HistoryPeriod, Symbol, UtcDateTime, ValidationError};

/// One reporting period value, e.g. quarterly revenue for `2024-06-30`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodValue {
    pub period: String,
    pub value: Decimal,
}

impl PeriodValue {
    pub fn new(period: impl Into<String>, value: Decimal) -> Self {
        Self {
            period: period.into(),
            value,
        }
    }
}

/// Quarterly income statement block, newest period first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub quarterly_revenue: Option<Vec<PeriodValue>>,
    pub net_income: Option<Vec<PeriodValue>>,
    pub as_of: UtcDateTime,
}

impl Fundamentals {
    pub fn is_empty(&self) -> bool {
        self.quarterly_revenue.is_none() && self.net_income.is_none()
    }
}

/// One market-data observation for a symbol.
///
/// Every provider-sourced field is optional: a value the provider did not send
/// stays `None` rather than collapsing to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub symbol: Symbol,
    pub fetched_at: UtcDateTime,
    pub currency: Option<String>,
    pub current_price: Option<Decimal>,
    pub previous_close: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub day_low: Option<Decimal>,
    pub day_high: Option<Decimal>,
    pub fifty_two_week_low: Option<Decimal>,
    pub fifty_two_week_high: Option<Decimal>,
    pub volume: Option<u64>,
    pub average_volume: Option<u64>,
    pub pe_ratio: Option<Decimal>,
    pub forward_pe: Option<Decimal>,
    pub eps: Option<Decimal>,
    pub profit_margin: Option<Decimal>,
    pub dividend_yield: Option<Decimal>,
    pub next_earnings_date: Option<UtcDateTime>,
    pub quarterly_revenue: Option<Vec<PeriodValue>>,
    pub net_income: Option<Vec<PeriodValue>>,
    pub fundamentals_as_of: Option<UtcDateTime>,
    pub technical_indicators: Option<TechnicalIndicators>,
}

impl TickerSnapshot {
    /// Empty snapshot; callers fill in whatever the provider returned.
    pub fn new(symbol: Symbol, fetched_at: UtcDateTime) -> Self {
        Self {
            symbol,
            fetched_at,
            currency: None,
            current_price: None,
            previous_close: None,
            market_cap: None,
            day_low: None,
            day_high: None,
            fifty_two_week_low: None,
            fifty_two_week_high: None,
            volume: None,
            average_volume: None,
            pe_ratio: None,
            forward_pe: None,
            eps: None,
            profit_margin: None,
            dividend_yield: None,
            next_earnings_date: None,
            quarterly_revenue: None,
            net_income: None,
            fundamentals_as_of: None,
            technical_indicators: None,
        }
    }

    pub fn with_fundamentals(mut self, fundamentals: Fundamentals) -> Self {
        self.quarterly_revenue = fundamentals.quarterly_revenue;
        self.net_income = fundamentals.net_income;
        self.fundamentals_as_of = Some(fundamentals.as_of);
        self
    }

    pub fn with_indicators(mut self, indicators: TechnicalIndicators) -> Self {
        self.technical_indicators = Some(indicators);
        self
    }

    /// The revenue/net-income block carried by this snapshot, if it was ever fetched.
    pub fn fundamentals(&self) -> Option<Fundamentals> {
        self.fundamentals_as_of.map(|as_of| Fundamentals {
            quarterly_revenue: self.quarterly_revenue.clone(),
            net_income: self.net_income.clone(),
            as_of,
        })
    }
}

/// OHLCV observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub ts: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
}

impl PriceBar {
    pub fn new(
        ts: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: Option<u64>,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }

        Ok(Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Ordered (oldest first) price series for a symbol and lookback period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub symbol: Symbol,
    pub period: HistoryPeriod,
    pub bars: Vec<PriceBar>,
}

impl PriceHistory {
    pub fn new(symbol: Symbol, period: HistoryPeriod, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|bar| bar.ts);
        bars.dedup_by_key(|bar| bar.ts);
        Self {
            symbol,
            period,
            bars,
        }
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.close).collect()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_ts(&self) -> Option<UtcDateTime> {
        self.bars.last().map(|bar| bar.ts)
    }
}

/// MACD line, signal line and their difference at the latest point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Macd {
    pub value: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Simple moving average for one window size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingAverage {
    pub window: usize,
    pub value: Option<f64>,
    /// Latest close strictly above the average.
    pub price_above: Option<bool>,
}

/// Derived analytics over a price series.
///
/// `None` means "not computable from the available history", never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIndicators {
    pub history_len: usize,
    pub rsi: Option<f64>,
    pub macd: Option<Macd>,
    pub moving_averages: Vec<MovingAverage>,
    pub overbought: Option<bool>,
    pub oversold: Option<bool>,
    pub macd_crossover: Option<bool>,
}

impl TechnicalIndicators {
    pub fn sma(&self, window: usize) -> Option<&MovingAverage> {
        self.moving_averages
            .iter()
            .find(|average| average.window == window)
    }
}

/// Convert a provider float into a decimal field.
pub fn decimal_from_f64(field: &'static str, value: f64) -> Result<Decimal, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    Decimal::from_f64(value).ok_or(ValidationError::NonFiniteValue { field })
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

//! # Provider Boundary
//!
//! [`MarketDataProvider`] is the seam between the collector and an upstream
//! market-data API. Implementations convert raw responses into domain records and
//! classify every failure into a [`ProviderErrorKind`] so the retry policy can
//! decide whether another attempt is worthwhile.
//!
//! | Kind | Retryable |
//! |------|-----------|
//! | `RateLimited` | yes |
//! | `Timeout` | yes |
//! | `Unavailable` | yes |
//! | `InvalidTicker` | no |
//! | `MalformedResponse` | no |
//! | `InvalidRequest` | no |
//! | `Internal` | no |

mod yahoo;

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::{Fundamentals, HistoryPeriod, PriceHistory, Symbol, TickerSnapshot};

pub use yahoo::{YahooProvider, YahooSession};

/// Provider-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    InvalidTicker,
    RateLimited,
    Timeout,
    MalformedResponse,
    Unavailable,
    InvalidRequest,
    Internal,
}

impl ProviderErrorKind {
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout | Self::Unavailable)
    }
}

/// Structured provider error consumed by the retry policy and collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
    retryable: bool,
}

impl ProviderError {
    fn with_kind(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.is_retryable(),
        }
    }

    pub fn invalid_ticker(symbol: &Symbol) -> Self {
        Self::with_kind(
            ProviderErrorKind::InvalidTicker,
            format!("symbol '{symbol}' is not known to the provider"),
        )
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::with_kind(ProviderErrorKind::RateLimited, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::with_kind(ProviderErrorKind::Timeout, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::with_kind(ProviderErrorKind::MalformedResponse, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::with_kind(ProviderErrorKind::Unavailable, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::with_kind(ProviderErrorKind::InvalidRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_kind(ProviderErrorKind::Internal, message)
    }

    pub const fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ProviderErrorKind::InvalidTicker => "provider.invalid_ticker",
            ProviderErrorKind::RateLimited => "provider.rate_limited",
            ProviderErrorKind::Timeout => "provider.timeout",
            ProviderErrorKind::MalformedResponse => "provider.malformed_response",
            ProviderErrorKind::Unavailable => "provider.unavailable",
            ProviderErrorKind::InvalidRequest => "provider.invalid_request",
            ProviderErrorKind::Internal => "provider.internal",
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for ProviderError {}

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Upstream market-data API.
///
/// Every call is a single attempt; throttling and retries are layered on top by
/// the collector.
pub trait MarketDataProvider: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Latest quote and key statistics.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] classified as `InvalidTicker`, `Timeout`,
    /// `RateLimited`, `MalformedResponse` or `Unavailable`.
    fn fetch_quote<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, TickerSnapshot>;

    /// Price bars covering `period`, oldest first.
    fn fetch_history<'a>(
        &'a self,
        symbol: &'a Symbol,
        period: HistoryPeriod,
    ) -> ProviderFuture<'a, PriceHistory>;

    /// Quarterly revenue and net income, newest period first.
    fn fetch_fundamentals<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, Fundamentals>;
}

//! Collector configuration with `FINBOARD_*` environment overrides.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `FINBOARD_MAX_REQUESTS` | `rate_limit.max_requests` |
//! | `FINBOARD_RATE_WINDOW_SECS` | `rate_limit.window` |
//! | `FINBOARD_QUOTE_TTL_SECS` | `cache.quote_ttl` |
//! | `FINBOARD_FUNDAMENTALS_TTL_SECS` | `cache.fundamentals_ttl` |
//! | `FINBOARD_RETRY_MAX_ATTEMPTS` | `retry.max_attempts` |
//! | `FINBOARD_RETRY_BASE_MS` | `retry.base_delay` |
//! | `FINBOARD_RETRY_MAX_MS` | `retry.max_delay` |
//! | `FINBOARD_REQUEST_TIMEOUT_MS` | `request_timeout` and `retry.attempt_timeout` |
//! | `FINBOARD_RSI_OVERBOUGHT` | `indicators.rsi_overbought` |
//! | `FINBOARD_RSI_OVERSOLD` | `indicators.rsi_oversold` |
//! | `FINBOARD_SMA_WINDOWS` | `indicators.sma_windows` (comma separated) |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::indicators::IndicatorConfig;
use crate::retry::RetryConfig;
use crate::throttling::RateLimitConfig;
use crate::ValidationError;

#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    /// Transport deadline for one HTTP request.
    pub request_timeout: Duration,
    pub indicators: IndicatorConfig,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        let retry = RetryConfig::default();
        Self {
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            request_timeout: retry.attempt_timeout,
            retry,
            indicators: IndicatorConfig::default(),
        }
    }
}

impl CollectorConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overlaid with values returned by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let read = |key: &'static str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = read("FINBOARD_MAX_REQUESTS") {
            config.rate_limit.max_requests = parse_number("FINBOARD_MAX_REQUESTS", &value)?;
        }
        if let Some(value) = read("FINBOARD_RATE_WINDOW_SECS") {
            config.rate_limit.window = Duration::from_secs(parse_number("FINBOARD_RATE_WINDOW_SECS", &value)?);
        }
        if let Some(value) = read("FINBOARD_QUOTE_TTL_SECS") {
            config.cache.quote_ttl = Duration::from_secs(parse_number("FINBOARD_QUOTE_TTL_SECS", &value)?);
        }
        if let Some(value) = read("FINBOARD_FUNDAMENTALS_TTL_SECS") {
            config.cache.fundamentals_ttl =
                Duration::from_secs(parse_number("FINBOARD_FUNDAMENTALS_TTL_SECS", &value)?);
        }
        if let Some(value) = read("FINBOARD_RETRY_MAX_ATTEMPTS") {
            config.retry.max_attempts = parse_number("FINBOARD_RETRY_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read("FINBOARD_RETRY_BASE_MS") {
            config.retry.base_delay = Duration::from_millis(parse_number("FINBOARD_RETRY_BASE_MS", &value)?);
        }
        if let Some(value) = read("FINBOARD_RETRY_MAX_MS") {
            config.retry.max_delay = Duration::from_millis(parse_number("FINBOARD_RETRY_MAX_MS", &value)?);
        }
        if let Some(value) = read("FINBOARD_REQUEST_TIMEOUT_MS") {
            config.set_request_timeout(Duration::from_millis(parse_number(
                "FINBOARD_REQUEST_TIMEOUT_MS",
                &value,
            )?));
        }
        if let Some(value) = read("FINBOARD_RSI_OVERBOUGHT") {
            config.indicators.rsi_overbought = parse_number("FINBOARD_RSI_OVERBOUGHT", &value)?;
        }
        if let Some(value) = read("FINBOARD_RSI_OVERSOLD") {
            config.indicators.rsi_oversold = parse_number("FINBOARD_RSI_OVERSOLD", &value)?;
        }
        if let Some(value) = read("FINBOARD_SMA_WINDOWS") {
            config.indicators.sma_windows = value
                .split(',')
                .map(|window| parse_number("FINBOARD_SMA_WINDOWS", window))
                .collect::<Result<_, _>>()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets both the transport deadline and the retry policy's per-attempt deadline.
    pub fn set_request_timeout(&mut self, timeout: Duration) {
        self.request_timeout = timeout;
        self.retry.attempt_timeout = timeout;
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.rate_limit.validate()?;
        self.cache.validate()?;
        self.retry.validate()?;
        self.indicators.validate()?;
        if self.request_timeout.is_zero() {
            return Err(ValidationError::ZeroConfigValue {
                field: "request_timeout",
            });
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(field: &'static str, value: &str) -> Result<T, ValidationError> {
    value
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidConfigValue {
            field,
            value: value.to_owned(),
        })
}

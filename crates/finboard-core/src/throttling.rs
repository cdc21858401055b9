use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter as GovernorLimiter};
use tracing::debug;

use crate::ValidationError;

/// Admission budget for outbound provider requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests admitted per rolling window.
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_requests == 0 {
            return Err(ValidationError::ZeroConfigValue {
                field: "rate_limit.max_requests",
            });
        }
        if self.window.is_zero() {
            return Err(ValidationError::ZeroConfigValue {
                field: "rate_limit.window",
            });
        }
        Ok(())
    }
}

type DirectRateLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Process-wide GCRA limiter shared by every collector clone.
///
/// Requests are paced evenly across the window instead of being admitted in a
/// burst, which keeps every rolling window at or below `max_requests`.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<DirectRateLimiter>,
    config: RateLimitConfig,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let quota = quota_from_window(config.window, config.max_requests);
        Self {
            limiter: Arc::new(GovernorLimiter::direct(quota)),
            config,
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Suspends until a request slot is available and returns how long the caller waited.
    pub async fn acquire(&self) -> Duration {
        if self.limiter.check().is_ok() {
            return Duration::ZERO;
        }

        let started = Instant::now();
        self.limiter.until_ready().await;
        let waited = started.elapsed();
        debug!(waited_ms = waited.as_millis() as u64, "rate limiter delayed request");
        waited
    }

    /// Non-blocking variant of `acquire`; consumes a slot when one is available.
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// One cell every `ceil(window / max_requests)` with a burst of one.
///
/// Grants are at least `window / max_requests` apart, so any window of length
/// `window` holds at most `max_requests` of them.
fn quota_from_window(window: Duration, max_requests: u32) -> Quota {
    let cells = u128::from(max_requests.max(1));
    let nanos = window.as_nanos().div_ceil(cells).max(1);
    let period = Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::MIN)
}

//! Retry policy with exponential backoff, additive jitter and per-attempt deadlines.
//!
//! The retry loop is an explicit state machine:
//!
//! ```text
//! Attempt(1) --retryable--> Backoff --sleep--> Attempt(2) ... --> Done
//!      \--success / non-retryable / exhausted----------------------^
//! ```
//!
//! Every attempt is recorded as a [`FetchAttempt`] and handed back to the caller in
//! both the success report and the failure.

use std::future::Future;
use std::time::Duration;

use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::provider::{ProviderError, ProviderErrorKind};
use crate::throttling::RateLimiter;
use crate::{UtcDateTime, ValidationError};

/// Configuration for the retry mechanism.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each further attempt.
    pub base_delay: Duration,
    /// Upper bound for the un-jittered delay.
    pub max_delay: Duration,
    /// Jitter added on top of each delay, as a fraction of it, in `[0, 1)`.
    pub jitter_ratio: f64,
    /// Deadline for a single attempt; exceeding it counts as a retryable timeout.
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_ratio: 0.25,
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// No retries, no jitter.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            jitter_ratio: 0.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::ZeroConfigValue {
                field: "retry.max_attempts",
            });
        }
        if self.attempt_timeout.is_zero() {
            return Err(ValidationError::ZeroConfigValue {
                field: "retry.attempt_timeout",
            });
        }
        if self.max_delay < self.base_delay {
            return Err(ValidationError::InvalidConfigValue {
                field: "retry.max_delay",
                value: format!("{:?} < base {:?}", self.max_delay, self.base_delay),
            });
        }
        if !(0.0..1.0).contains(&self.jitter_ratio) {
            return Err(ValidationError::InvalidConfigValue {
                field: "retry.jitter_ratio",
                value: self.jitter_ratio.to_string(),
            });
        }
        Ok(())
    }
}

/// Exponential backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter_ratio: f64,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, jitter_ratio: f64) -> Self {
        Self {
            base,
            max,
            jitter_ratio: jitter_ratio.clamp(0.0, 0.999),
        }
    }

    /// Un-jittered delay after the `attempt`-th failure (1-based): `base * 2^(attempt-1)`, capped.
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .unwrap_or(self.max)
            .min(self.max)
    }

    /// Nominal delay plus uniform jitter in `[0, jitter_ratio * nominal)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let nominal = self.nominal_delay(attempt);
        if self.jitter_ratio == 0.0 {
            return nominal;
        }
        nominal + nominal.mul_f64(self.jitter_ratio * fastrand::f64())
    }
}

impl From<&RetryConfig> for Backoff {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.base_delay, config.max_delay, config.jitter_ratio)
    }
}

/// Outcome of a single provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    RateLimited,
    Timeout,
    InvalidResponse,
    InvalidTicker,
    Unavailable,
    UnknownError,
}

impl From<ProviderErrorKind> for AttemptOutcome {
    fn from(kind: ProviderErrorKind) -> Self {
        match kind {
            ProviderErrorKind::RateLimited => Self::RateLimited,
            ProviderErrorKind::Timeout => Self::Timeout,
            ProviderErrorKind::MalformedResponse => Self::InvalidResponse,
            ProviderErrorKind::InvalidTicker => Self::InvalidTicker,
            ProviderErrorKind::Unavailable => Self::Unavailable,
            ProviderErrorKind::InvalidRequest | ProviderErrorKind::Internal => Self::UnknownError,
        }
    }
}

/// Record of one provider call made under the retry policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchAttempt {
    pub attempt_number: u32,
    pub started_at: UtcDateTime,
    pub outcome: AttemptOutcome,
    #[serde(rename = "delay_before_next_ms", serialize_with = "serialize_millis")]
    pub delay_before_next: Option<Duration>,
}

fn serialize_millis<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(delay) => serializer.serialize_some(&(delay.as_millis() as u64)),
        None => serializer.serialize_none(),
    }
}

/// Successful result together with the attempts it took.
#[derive(Debug, Clone)]
pub struct RetryReport<T> {
    pub value: T,
    pub attempts: Vec<FetchAttempt>,
}

/// Terminal failure: the last error classification and every attempt made.
#[derive(Debug, Clone, Error)]
#[error("{error} (after {} attempt(s))", .attempts.len())]
pub struct RetryFailure {
    pub error: ProviderError,
    pub attempts: Vec<FetchAttempt>,
}

impl RetryFailure {
    pub fn kind(&self) -> ProviderErrorKind {
        self.error.kind()
    }
}

enum RetryStep {
    Attempt(u32),
    Backoff { next_attempt: u32, delay: Duration },
    Done(ProviderError),
}

/// Drives a fallible async action through the retry state machine.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    config: RetryConfig,
    backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            backoff: Backoff::from(&config),
            config,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Runs `action` until it succeeds, fails non-retryably, or attempts run out.
    ///
    /// `action` receives the 1-based attempt number.
    pub async fn execute<T, F, Fut>(&self, action: F) -> Result<RetryReport<T>, RetryFailure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.run(None, action).await
    }

    /// Like [`execute`](Self::execute), but every attempt first takes a slot from
    /// `limiter`. Time spent waiting for the slot is not charged to the attempt deadline.
    pub async fn execute_throttled<T, F, Fut>(
        &self,
        limiter: &RateLimiter,
        action: F,
    ) -> Result<RetryReport<T>, RetryFailure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.run(Some(limiter), action).await
    }

    async fn run<T, F, Fut>(&self, limiter: Option<&RateLimiter>, mut action: F) -> Result<RetryReport<T>, RetryFailure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = Vec::with_capacity(max_attempts as usize);
        let mut step = RetryStep::Attempt(1);

        loop {
            step = match step {
                RetryStep::Attempt(number) => {
                    if let Some(limiter) = limiter {
                        limiter.acquire().await;
                    }
                    let started_at = UtcDateTime::now();
                    let result = match tokio::time::timeout(self.config.attempt_timeout, action(number)).await {
                        Ok(result) => result,
                        Err(_) => Err(ProviderError::timeout(format!(
                            "attempt {number} exceeded {}ms",
                            self.config.attempt_timeout.as_millis()
                        ))),
                    };

                    match result {
                        Ok(value) => {
                            attempts.push(FetchAttempt {
                                attempt_number: number,
                                started_at,
                                outcome: AttemptOutcome::Success,
                                delay_before_next: None,
                            });
                            return Ok(RetryReport { value, attempts });
                        }
                        Err(error) if error.retryable() && number < max_attempts => {
                            let delay = self.backoff.delay(number);
                            warn!(
                                attempt = number,
                                max_attempts,
                                delay_ms = delay.as_millis() as u64,
                                error = %error,
                                "retryable provider failure"
                            );
                            attempts.push(FetchAttempt {
                                attempt_number: number,
                                started_at,
                                outcome: error.kind().into(),
                                delay_before_next: Some(delay),
                            });
                            RetryStep::Backoff {
                                next_attempt: number + 1,
                                delay,
                            }
                        }
                        Err(error) => {
                            debug!(attempt = number, error = %error, "provider call failed terminally");
                            attempts.push(FetchAttempt {
                                attempt_number: number,
                                started_at,
                                outcome: error.kind().into(),
                                delay_before_next: None,
                            });
                            RetryStep::Done(error)
                        }
                    }
                }
                RetryStep::Backoff {
                    next_attempt,
                    delay,
                } => {
                    tokio::time::sleep(delay).await;
                    RetryStep::Attempt(next_attempt)
                }
                RetryStep::Done(error) => return Err(RetryFailure { error, attempts }),
            };
        }
    }
}

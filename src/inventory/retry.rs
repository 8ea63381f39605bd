//! Exponential backoff for inventory lookups.
//!
//! Option lists are interactive: an operator is waiting on the dropdown. The
//! default budget is therefore small (2 retries, 250ms base, 2s cap). Only
//! transient failures are retried; permanent ones come back immediately.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error::{FailureKind, FetchFailure};

/// A retry configuration whose backoff could not produce valid delays.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("backoff multiplier must be positive and finite, got {0}")]
pub struct InvalidBackoffMultiplier(pub f64);

/// Configuration for exponential backoff retry.
///
/// [`RetryConfig::new`] and deserialization reject a backoff multiplier that
/// is not positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RetryConfigDef")]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,

    /// Delay before the first retry.
    #[serde(with = "millis")]
    pub initial_delay: Duration,

    /// Cap for exponential growth.
    #[serde(with = "millis")]
    pub max_delay: Duration,

    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Interactive lookups: 250ms, 500ms.
    pub const DEFAULT: Self = Self {
        max_retries: 2,
        initial_delay: Duration::from_millis(250),
        max_delay: Duration::from_secs(2),
        backoff_multiplier: 2.0,
    };

    /// Single attempt, no backoff.
    pub const NONE: Self = Self {
        max_retries: 0,
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        backoff_multiplier: 1.0,
    };

    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Result<Self, InvalidBackoffMultiplier> {
        if !backoff_multiplier.is_finite() || backoff_multiplier <= 0.0 {
            return Err(InvalidBackoffMultiplier(backoff_multiplier));
        }
        Ok(Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff_multiplier,
        })
    }

    /// Computes the delay for the given retry attempt (0-indexed).
    ///
    /// `initial_delay * backoff_multiplier^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(attempt as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        let capped_secs = delay_secs.min(self.max_delay.as_secs_f64()).max(0.0);
        Duration::from_secs_f64(capped_secs)
    }

    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|attempt| self.delay_for_attempt(attempt))
    }

    pub fn total_max_wait(&self) -> Duration {
        self.delays().sum()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Deserialize)]
struct RetryConfigDef {
    max_retries: u32,
    #[serde(with = "millis")]
    initial_delay: Duration,
    #[serde(with = "millis")]
    max_delay: Duration,
    backoff_multiplier: f64,
}

impl TryFrom<RetryConfigDef> for RetryConfig {
    type Error = InvalidBackoffMultiplier;

    fn try_from(def: RetryConfigDef) -> Result<Self, Self::Error> {
        RetryConfig::new(
            def.max_retries,
            def.initial_delay,
            def.max_delay,
            def.backoff_multiplier,
        )
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Retry policy for controlling retry behavior at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retry transient failures with exponential backoff.
    #[default]
    RetryTransient,

    /// Return the first failure.
    NoRetry,
}

/// Result of a retried operation.
#[derive(Debug)]
pub enum RetryResult<T> {
    Success(T),

    /// A transient failure persisted through every retry.
    ExhaustedRetries {
        last_error: FetchFailure,
        /// Attempts made, including the initial one.
        attempts: u32,
    },

    /// A permanent failure (not retried).
    PermanentError(FetchFailure),
}

impl<T> RetryResult<T> {
    pub fn into_result(self) -> Result<T, FetchFailure> {
        match self {
            RetryResult::Success(v) => Ok(v),
            RetryResult::ExhaustedRetries { last_error, .. } => Err(last_error),
            RetryResult::PermanentError(e) => Err(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success(_))
    }
}

/// Executes an async operation, retrying transient failures.
///
/// `operation` is called again after each transient failure until it
/// succeeds, fails permanently, or `config.max_retries` is used up.
pub async fn retry_with_backoff<T, F, Fut>(
    config: RetryConfig,
    policy: RetryPolicy,
    mut operation: F,
) -> RetryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchFailure>>,
{
    let mut attempt = 0;
    let max_attempts = if policy == RetryPolicy::NoRetry {
        1
    } else {
        config.max_retries + 1
    };

    loop {
        match operation().await {
            Ok(value) => return RetryResult::Success(value),
            Err(e) => {
                attempt += 1;

                match e.kind {
                    FailureKind::Permanent => return RetryResult::PermanentError(e),
                    FailureKind::Transient => {
                        if attempt >= max_attempts {
                            return RetryResult::ExhaustedRetries {
                                last_error: e,
                                attempts: attempt,
                            };
                        }

                        let delay = config.delay_for_attempt(attempt - 1);
                        tracing::debug!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "retrying inventory lookup"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

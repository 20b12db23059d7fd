//! Bounded exponential-backoff retry executor.
//!
//! [`RetryPolicy`] wraps any fallible async unit of work. It knows nothing
//! about what it retries: whether an error is worth another attempt is
//! decided by the error's [`Retryable`] impl, or by an explicit predicate
//! via [`RetryPolicy::execute_if`].
//!
//! The delay before retry *k* (k ≥ 1) is `base_delay * 2^(k-1)`, capped at
//! `max_delay`.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Default cap on a single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Failure of a retried unit of work.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The error was not retryable and was returned on first sight
    #[error("{0}")]
    Fatal(E),

    /// Every allowed attempt failed
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    /// The last underlying failure.
    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::RetriesExhausted { last, .. } => last,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::RetriesExhausted { last, .. } => last,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::RetriesExhausted { .. })
    }
}

/// Retry parameters shared by every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Default::default()
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    // ==================== Builder Methods ====================

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op`, retrying errors that report themselves retryable.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        self.execute_if(op, E::is_retryable).await
    }

    /// Run `op`, retrying errors for which `should_retry` holds.
    pub async fn execute_if<T, E, F, Fut, P>(
        &self,
        mut op: F,
        should_retry: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut retries = 0u32;
        loop {
            match op().await {
                Ok(value) => {
                    if retries > 0 {
                        info!(retries, "Operation recovered after retries");
                    }
                    return Ok(value);
                }
                Err(e) if !should_retry(&e) => return Err(RetryError::Fatal(e)),
                Err(e) if retries >= self.max_retries => {
                    warn!(attempts = retries + 1, error = %e, "Retries exhausted");
                    return Err(RetryError::RetriesExhausted {
                        attempts: retries + 1,
                        last: e,
                    });
                }
                Err(e) => {
                    retries += 1;
                    let delay = self.delay_for(retries);
                    warn!(
                        attempt = retries,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Retry `op` with `max_retries` retries and a `base_delay_ms` backoff base.
///
/// Exposed for callers that implement their own resubmission on top of the
/// engine.
pub async fn retry_with_backoff<T, E, F, Fut>(
    op: F,
    max_retries: u32,
    base_delay_ms: u64,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    RetryPolicy::new(max_retries, Duration::from_millis(base_delay_ms))
        .execute(op)
        .await
}

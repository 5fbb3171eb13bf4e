//! Retry logic.
//!
//! # Responsibilities
//! - Run an operation once, then up to `max_attempts` more times on failure
//! - Consult the retryability predicate before every retry
//! - Wait with exponential backoff between attempts, aborting on cancellation
//!
//! # Design Decisions
//! - No predicate means every error is retryable
//! - Exhaustion returns the last error observed, never a synthetic one
//! - The backoff wait is the only suspension point and observes the `Context`

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::lifecycle::{Cancelled, Context};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Classifies an error as transient (`true`) or permanent.
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Bounded retry executor. Immutable once built; clone freely.
pub struct Retry<E> {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
    retryable: Option<RetryPredicate<E>>,
}

impl<E> Retry<E> {
    /// `max_attempts` extra attempts after the first, starting from `base_delay`.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: Duration::MAX,
            jitter: false,
            retryable: None,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.base_delay_ms))
            .with_max_delay(Duration::from_millis(config.max_delay_ms))
            .with_jitter(config.jitter)
    }

    pub fn with_retryable<F>(mut self, retryable: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retryable = Some(Arc::new(retryable));
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_retryable(&self, err: &E) -> bool {
        self.retryable.as_ref().map_or(true, |retryable| retryable(err))
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// The first attempt always runs. A cancellation observed while waiting
    /// between attempts returns immediately as `E::from(Cancelled)`.
    pub async fn execute<T, F, Fut>(&self, ctx: &Context, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<Cancelled> + fmt::Display,
    {
        let mut attempt: u32 = 0;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !self.is_retryable(&err) {
                tracing::debug!(attempt = attempt + 1, error = %err, "Permanent error, not retrying");
                return Err(err);
            }
            if attempt >= self.max_attempts {
                tracing::warn!(attempts = attempt + 1, error = %err, "Retries exhausted");
                return Err(err);
            }

            attempt += 1;
            let delay = calculate_backoff(attempt, self.base_delay, self.max_delay, self.jitter);
            metrics::record_retry_attempt();
            tracing::debug!(attempt, delay = ?delay, error = %err, "Retrying after transient error");

            tokio::select! {
                biased;
                cancelled = ctx.cancelled() => {
                    tracing::debug!(attempt, reason = %cancelled.reason, "Retry wait cancelled");
                    return Err(E::from(cancelled));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl<E> Clone for Retry<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            jitter: self.jitter,
            retryable: self.retryable.clone(),
        }
    }
}

impl<E> fmt::Debug for Retry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .field("has_predicate", &self.retryable.is_some())
            .finish()
    }
}

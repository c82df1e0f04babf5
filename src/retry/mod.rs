//! Retry policy
//!
//! Re-runs a failed operation up to a fixed number of attempts, waiting
//! between attempts according to a [`Backoff`] schedule with optional jitter.
//! The wait is cancellable: if the context finishes first, the context's error
//! is returned instead of the operation's.

pub mod backoff;

pub use backoff::{apply_jitter, Backoff, BackoffConfig};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::policy::{Operation, Policy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Decides whether an error is worth another attempt
pub type RetryPredicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Delay schedule between attempts
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Randomization factor (0.3 = ±15% spread around the delay)
    #[serde(default)]
    pub jitter: f64,
}

fn default_attempts() -> u32 {
    3
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff: BackoffConfig::default(),
            jitter: 0.0,
        }
    }
}

/// Retry policy
#[derive(Clone)]
pub struct Retry {
    attempts: u32,
    backoff: Backoff,
    jitter: f64,
    predicate: Option<RetryPredicate>,
}

impl Retry {
    /// Retry up to `attempts` times with no delay between attempts
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts,
            backoff: Backoff::none(),
            jitter: 0.0,
            predicate: None,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.attempts)
            .with_backoff(Backoff::from(&config.backoff))
            .with_jitter(config.jitter)
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Randomize each delay by up to `factor` of its length
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter = factor;
        self
    }

    /// Only retry errors for which `predicate` returns true
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Delay after the failure of attempt `attempt`, jitter included
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        apply_jitter(self.backoff.delay(attempt), self.jitter)
    }

    fn is_retryable(&self, err: &Error) -> bool {
        if err.is_short_circuit() {
            return false;
        }
        self.predicate.as_ref().map_or(true, |predicate| predicate(err))
    }
}

impl fmt::Debug for Retry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("attempts", &self.attempts)
            .field("backoff", &self.backoff)
            .field("jitter", &self.jitter)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

#[async_trait]
impl<T: Send + 'static> Policy<T> for Retry {
    async fn call(&self, ctx: Context, op: Operation<T>) -> Result<T> {
        // At least one attempt always runs
        let attempts = self.attempts.max(1);
        let mut attempt = 0;

        loop {
            let err = match op(ctx.clone()).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt, "Operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !self.is_retryable(&err) {
                debug!(attempt, error = %err, "Error not retryable");
                return Err(err);
            }

            let delay = self.delay_for_attempt(attempt);
            debug!(
                attempt,
                max_attempts = attempts,
                wait_ms = delay.as_millis() as u64,
                error = %err,
                "Operation failed, backing off"
            );

            ctx.sleep(delay).await?;

            attempt += 1;
            if attempt >= attempts {
                warn!(attempts, error = %err, "Operation failed after max attempts");
                return Err(err);
            }
        }
    }
}

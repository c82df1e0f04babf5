use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Maps a 0-based attempt index to the wait before the next attempt
#[derive(Clone)]
pub struct Backoff {
    strategy: Arc<dyn Fn(u32) -> Duration + Send + Sync>,
    label: &'static str,
}

impl Backoff {
    /// Always wait `delay`
    pub fn constant(delay: Duration) -> Self {
        Self {
            strategy: Arc::new(move |_| delay),
            label: "constant",
        }
    }

    /// Wait `base * 2^attempt`, saturating at [`Duration::MAX`]
    pub fn exponential(base: Duration) -> Self {
        Self {
            strategy: Arc::new(move |attempt| {
                2u32.checked_pow(attempt)
                    .and_then(|factor| base.checked_mul(factor))
                    .unwrap_or(Duration::MAX)
            }),
            label: "exponential",
        }
    }

    /// Retry immediately
    pub fn none() -> Self {
        Self::constant(Duration::ZERO)
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self {
            strategy: Arc::new(f),
            label: "custom",
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        (self.strategy)(attempt)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Backoff").field(&self.label).finish()
    }
}

/// Serializable description of a [`Backoff`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackoffConfig {
    Constant {
        #[serde(default)]
        delay_ms: u64,
    },
    Exponential {
        base_ms: u64,
    },
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig::Constant { delay_ms: 0 }
    }
}

impl From<&BackoffConfig> for Backoff {
    fn from(config: &BackoffConfig) -> Self {
        match config {
            BackoffConfig::Constant { delay_ms } => {
                Backoff::constant(Duration::from_millis(*delay_ms))
            }
            BackoffConfig::Exponential { base_ms } => {
                Backoff::exponential(Duration::from_millis(*base_ms))
            }
        }
    }
}

/// Shift `delay` by a uniform offset within ±`factor / 2` of its length
pub fn apply_jitter(delay: Duration, factor: f64) -> Duration {
    if factor <= 0.0 || delay.is_zero() {
        return delay;
    }

    let secs = delay.as_secs_f64();
    let spread = secs * factor;
    let offset = rand::thread_rng().gen::<f64>() * spread - spread / 2.0;

    Duration::try_from_secs_f64((secs + offset).max(0.0)).unwrap_or(delay)
}

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Circuit is closed, calls flow normally
    Closed,
    /// Circuit is open, calls are rejected
    Open,
    /// Circuit is half-open, allowing probe calls
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "Closed"),
            CircuitState::Open => write!(f, "Open"),
            CircuitState::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long the circuit stays open before admitting probes
    #[serde(default = "default_open_duration_ms")]
    pub open_duration_ms: u64,

    /// Number of concurrent probe calls allowed in half-open state
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Zero the failure count this often while closed
    #[serde(default)]
    pub reset_interval_ms: Option<u64>,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_open_duration_ms() -> u64 {
    30_000
}

fn default_max_requests() -> u32 {
    1
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            open_duration_ms: default_open_duration_ms(),
            max_requests: default_max_requests(),
            reset_interval_ms: None,
        }
    }
}

/// Whole milliseconds, rounding any remainder up so short durations stay non-zero
fn millis_ceil(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

impl CircuitBreakerConfig {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            failure_threshold,
            ..Default::default()
        }
    }

    /// Set how long the circuit remains open after tripping.
    ///
    /// A zero duration is ignored.
    pub fn with_open_duration(mut self, duration: Duration) -> Self {
        if !duration.is_zero() {
            self.open_duration_ms = millis_ceil(duration);
        }
        self
    }

    /// Set how many probes may run concurrently while half-open.
    ///
    /// Zero is ignored.
    pub fn with_max_requests(mut self, max_requests: u32) -> Self {
        if max_requests > 0 {
            self.max_requests = max_requests;
        }
        self
    }

    /// Forget old failures every `interval` while the circuit is closed,
    /// so sparse unrelated errors never add up to a trip.
    pub fn with_reset_interval(mut self, interval: Duration) -> Self {
        self.reset_interval_ms = if interval.is_zero() {
            None
        } else {
            Some(millis_ceil(interval))
        };
        self
    }

    /// Threshold actually enforced; a zero threshold trips on the first failure
    pub fn threshold(&self) -> u32 {
        self.failure_threshold.max(1)
    }

    pub fn open_duration(&self) -> Duration {
        if self.open_duration_ms == 0 {
            Duration::from_millis(default_open_duration_ms())
        } else {
            Duration::from_millis(self.open_duration_ms)
        }
    }

    pub fn half_open_limit(&self) -> u32 {
        self.max_requests.max(1)
    }

    pub fn reset_interval(&self) -> Option<Duration> {
        self.reset_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

use super::types::{CircuitBreakerConfig, CircuitState};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::policy::{Operation, Policy};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Stand-in for an open duration too long to add to the clock
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Circuit breaker guarding a single call-site.
///
/// Clones share the same state, so one breaker can be handed to every task
/// calling the same downstream operation.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    /// Configuration
    config: Arc<CircuitBreakerConfig>,
    /// Current state
    state: Arc<Mutex<State>>,
    /// Call-site identifier used in logs
    name: Arc<str>,
}

#[derive(Debug)]
struct State {
    /// Current circuit state
    circuit_state: CircuitState,
    /// Consecutive failures since the last success or reset
    consecutive_failures: u32,
    /// When the failure count was last zeroed by the reset interval
    last_reset: Instant,
    /// Earliest time an open circuit admits a probe
    next_attempt: Instant,
    /// Number of half-open probes in flight
    half_open_running: u32,
    /// Bumped on every transition so stale probes can be told apart
    generation: u64,
}

/// Circuit state a call was admitted in, plus the state generation at that time
#[derive(Debug, Clone, Copy)]
struct Admission {
    circuit_state: CircuitState,
    generation: u64,
}

impl CircuitBreaker {
    /// Create a breaker that opens after `failure_threshold` consecutive failures
    pub fn new(failure_threshold: u32) -> Self {
        Self::with_config(CircuitBreakerConfig::new(failure_threshold))
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self::named("default", config)
    }

    /// Create a breaker whose log lines carry `name`
    pub fn named(name: impl Into<Arc<str>>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            breaker = %name,
            failure_threshold = config.threshold(),
            open_duration = ?config.open_duration(),
            max_requests = config.half_open_limit(),
            reset_interval = ?config.reset_interval(),
            "Creating circuit breaker"
        );

        let now = Instant::now();
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(State {
                circuit_state: CircuitState::Closed,
                consecutive_failures: 0,
                last_reset: now,
                next_attempt: now,
                half_open_running: 0,
                generation: 0,
            })),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Decide whether a call may proceed, returning the state it was admitted in
    fn admit(&self) -> Result<Admission> {
        let mut state = self.lock();
        let now = Instant::now();

        if state.circuit_state == CircuitState::Closed {
            if let Some(interval) = self.config.reset_interval() {
                if now.duration_since(state.last_reset) >= interval {
                    if state.consecutive_failures > 0 {
                        debug!(
                            breaker = %self.name,
                            consecutive_failures = state.consecutive_failures,
                            "Reset interval elapsed, clearing failure count"
                        );
                    }
                    state.consecutive_failures = 0;
                    state.last_reset = now;
                }
            }
        }

        if state.circuit_state == CircuitState::Open && now >= state.next_attempt {
            self.transition_to_half_open(&mut state);
        }

        match state.circuit_state {
            CircuitState::Closed => Ok(Admission {
                circuit_state: CircuitState::Closed,
                generation: state.generation,
            }),
            CircuitState::Open => {
                debug!(
                    breaker = %self.name,
                    time_remaining = ?state.next_attempt.saturating_duration_since(now),
                    "Circuit breaker open, rejecting call"
                );
                Err(Error::CircuitOpen)
            }
            CircuitState::HalfOpen => {
                if state.half_open_running >= self.config.half_open_limit() {
                    debug!(
                        breaker = %self.name,
                        max = self.config.half_open_limit(),
                        "Max half-open probes in flight, rejecting"
                    );
                    return Err(Error::CircuitTooManyRequests);
                }
                state.half_open_running += 1;
                debug!(
                    breaker = %self.name,
                    half_open_running = state.half_open_running,
                    max = self.config.half_open_limit(),
                    "Allowing half-open probe call"
                );
                Ok(Admission {
                    circuit_state: CircuitState::HalfOpen,
                    generation: state.generation,
                })
            }
        }
    }

    /// Fold the outcome of an admitted call back into the state
    fn record<T>(&self, result: Result<T>) -> Result<T> {
        let mut state = self.lock();

        let err = match result {
            Ok(value) => {
                if state.circuit_state != CircuitState::Closed {
                    self.transition_to_closed(&mut state);
                }
                state.consecutive_failures = 0;
                state.half_open_running = 0;
                return Ok(value);
            }
            Err(err) => err,
        };

        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        match state.circuit_state {
            CircuitState::HalfOpen => {
                warn!(
                    breaker = %self.name,
                    error = %err,
                    "Half-open probe failed, reopening circuit"
                );
                self.transition_to_open(&mut state);
                Err(err)
            }
            CircuitState::Closed if state.consecutive_failures >= self.config.threshold() => {
                self.transition_to_open(&mut state);
                Err(Error::CircuitTripped {
                    source: Box::new(err),
                })
            }
            _ => {
                debug!(
                    breaker = %self.name,
                    consecutive_failures = state.consecutive_failures,
                    threshold = self.config.threshold(),
                    "Call failed"
                );
                Err(err)
            }
        }
    }

    /// Release a probe slot whose call never reported back.
    ///
    /// Slots taken in an earlier half-open window are already gone.
    fn abandon_probe(&self, generation: u64) {
        let mut state = self.lock();
        if state.circuit_state == CircuitState::HalfOpen && state.generation == generation {
            state.half_open_running = state.half_open_running.saturating_sub(1);
            debug!(breaker = %self.name, "Half-open probe abandoned");
        }
    }

    /// Transition to open state
    fn transition_to_open(&self, state: &mut State) {
        info!(
            breaker = %self.name,
            consecutive_failures = state.consecutive_failures,
            open_duration = ?self.config.open_duration(),
            "Circuit breaker opening"
        );

        let now = Instant::now();
        state.circuit_state = CircuitState::Open;
        state.next_attempt = now
            .checked_add(self.config.open_duration())
            .unwrap_or_else(|| now + FAR_FUTURE);
        state.half_open_running = 0;
        state.generation = state.generation.wrapping_add(1);
    }

    /// Transition to half-open state
    fn transition_to_half_open(&self, state: &mut State) {
        info!(breaker = %self.name, "Circuit breaker transitioning to half-open");

        state.circuit_state = CircuitState::HalfOpen;
        state.half_open_running = 0;
        state.generation = state.generation.wrapping_add(1);
    }

    /// Transition to closed state
    fn transition_to_closed(&self, state: &mut State) {
        info!(breaker = %self.name, "Circuit breaker closing");

        state.circuit_state = CircuitState::Closed;
        state.consecutive_failures = 0;
        state.half_open_running = 0;
        state.generation = state.generation.wrapping_add(1);
    }
}

/// Gives a half-open slot back if the probe is dropped or panics before reporting
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    /// Generation of the half-open window that admitted the probe
    armed: Option<u64>,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if let Some(generation) = self.armed {
            self.breaker.abandon_probe(generation);
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Policy<T> for CircuitBreaker {
    async fn call(&self, ctx: Context, op: Operation<T>) -> Result<T> {
        let admitted = self.admit()?;

        let mut guard = ProbeGuard {
            breaker: self,
            armed: (admitted.circuit_state == CircuitState::HalfOpen)
                .then_some(admitted.generation),
        };
        let result = op(ctx).await;
        guard.armed = None;

        self.record(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyExt;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn fail(cb: &CircuitBreaker) -> Error {
        cb.execute(Context::background(), |_ctx| async {
            Err::<(), _>(Error::msg("backend down"))
        })
        .await
        .unwrap_err()
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<u32> {
        cb.execute(Context::background(), |_ctx| async { Ok(1) }).await
    }

    #[tokio::test]
    async fn test_circuit_breaker_passes_success_through() {
        let cb = CircuitBreaker::new(3);
        assert_eq!(succeed(&cb).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_circuit_trips_on_threshold_failure() {
        let cb = CircuitBreaker::new(3);

        for _ in 0..2 {
            let err = fail(&cb).await;
            assert_eq!(err.to_string(), "backend down");
        }

        let err = fail(&cb).await;
        assert!(err.is_tripped());

        let err = fail(&cb).await;
        assert!(matches!(err, Error::CircuitOpen));
    }

    #[tokio::test]
    async fn test_circuit_resets_on_success() {
        let cb = CircuitBreaker::new(3);

        for _ in 0..2 {
            fail(&cb).await;
        }
        succeed(&cb).await.unwrap();

        // Counter starts over after a success
        for _ in 0..2 {
            assert!(!fail(&cb).await.is_tripped());
        }
        assert!(fail(&cb).await.is_tripped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_never_invokes_operation() {
        let cb = CircuitBreaker::with_config(
            CircuitBreakerConfig::new(1).with_open_duration(Duration::from_secs(5)),
        );
        fail(&cb).await;

        let calls = Arc::new(AtomicU32::new(0));
        for _ in 0..10 {
            let calls = Arc::clone(&calls);
            let result = cb
                .execute(Context::background(), move |_ctx| {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
                .await;
            assert!(matches!(result, Err(Error::CircuitOpen)));
            tokio::time::sleep(Duration::from_millis(400)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_closes_on_success() {
        let cb = CircuitBreaker::with_config(
            CircuitBreakerConfig::new(2).with_open_duration(Duration::from_millis(100)),
        );
        fail(&cb).await;
        assert!(fail(&cb).await.is_tripped());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(succeed(&cb).await.unwrap(), 1);

        // Closed again with a fresh counter
        assert!(!fail(&cb).await.is_tripped());
        assert!(fail(&cb).await.is_tripped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens_immediately() {
        let cb = CircuitBreaker::with_config(
            CircuitBreakerConfig::new(5).with_open_duration(Duration::from_millis(100)),
        );
        for _ in 0..5 {
            fail(&cb).await;
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        let err = fail(&cb).await;
        assert_eq!(err.to_string(), "backend down");

        // Reopened with a fresh open window
        assert!(matches!(succeed(&cb).await, Err(Error::CircuitOpen)));
        tokio::time::sleep(Duration::from_millis(99)).await;
        assert!(matches!(succeed(&cb).await, Err(Error::CircuitOpen)));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(succeed(&cb).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_interval_forgets_sparse_failures() {
        let cb = CircuitBreaker::with_config(
            CircuitBreakerConfig::new(3).with_reset_interval(Duration::from_secs(1)),
        );

        for _ in 0..2 {
            fail(&cb).await;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        for _ in 0..2 {
            assert!(!fail(&cb).await.is_tripped());
        }
        assert!(fail(&cb).await.is_tripped());
    }

    #[tokio::test]
    async fn test_unbounded_open_duration_stays_open() {
        let cb = CircuitBreaker::with_config(
            CircuitBreakerConfig::new(1).with_open_duration(Duration::MAX),
        );

        assert!(fail(&cb).await.is_tripped());
        assert!(matches!(succeed(&cb).await, Err(Error::CircuitOpen)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_leaves_probe_count_alone() {
        let cb = CircuitBreaker::with_config(
            CircuitBreakerConfig::new(1)
                .with_open_duration(Duration::from_millis(10))
                .with_max_requests(3),
        );
        fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let stale = cb.admit().unwrap();
        let current = cb.admit().unwrap();
        assert_eq!(stale.generation, current.generation);
        {
            let mut state = cb.lock();
            cb.transition_to_open(&mut state);
            state.next_attempt = Instant::now();
        }
        let fresh = cb.admit().unwrap();
        assert_ne!(fresh.generation, stale.generation);

        cb.abandon_probe(stale.generation);
        assert_eq!(cb.lock().half_open_running, 1);
        cb.abandon_probe(fresh.generation);
        assert_eq!(cb.lock().half_open_running, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_probe_releases_slot() {
        let cb = CircuitBreaker::with_config(
            CircuitBreakerConfig::new(1).with_open_duration(Duration::from_millis(10)),
        );
        fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Probe that never finishes, abandoned by the caller
        let stalled = cb.execute(Context::background(), |_ctx| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(0u32)
        });
        let abandoned = tokio::time::timeout(Duration::from_millis(5), stalled).await;
        assert!(abandoned.is_err());

        assert_eq!(succeed(&cb).await.unwrap(), 1);
    }
}

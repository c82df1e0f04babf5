//! Circuit breaker policy
//!
//! Tracks consecutive failures of one call-site and stops calling it once they
//! reach a threshold:
//!
//! - **Closed**: calls pass through; failures are counted, any success clears them.
//! - **Open**: calls are rejected with [`Error::CircuitOpen`](crate::Error::CircuitOpen)
//!   without running the operation, until the open duration has passed.
//! - **HalfOpen**: up to `max_requests` probes run concurrently; one success
//!   closes the circuit, one failure reopens it.
//!
//! The call that trips the circuit gets
//! [`Error::CircuitTripped`](crate::Error::CircuitTripped) instead of its own
//! error, so callers can tell it apart from ordinary failures.
//!
//! Timing details:
//!
//! - A call arriving exactly when the open duration ends is already admitted
//!   as a probe.
//! - The open duration is measured from the moment the failing call's outcome
//!   is recorded, not from when that call started.

pub mod breaker;
pub mod registry;
pub mod types;

pub use breaker::CircuitBreaker;
pub use registry::BreakerRegistry;
pub use types::{CircuitBreakerConfig, CircuitState};

pub mod circuit_breaker;
pub mod config;
pub mod context;
pub mod error;
pub mod fallback;
pub mod limiter;
pub mod observability;
pub mod policy;
pub mod recover;
pub mod retry;
pub mod short_circuit;
pub mod switch;
pub mod timeout;

pub use circuit_breaker::{BreakerRegistry, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::{LayerConfig, StackConfig};
pub use context::Context;
pub use error::{BoxError, Error, Result};
pub use fallback::Fallback;
pub use limiter::{Limiter, LimiterConfig};
pub use policy::{operation, policy_fn, Chain, Operation, Policy, PolicyExt, PolicyFn};
pub use recover::Recover;
pub use retry::{Backoff, BackoffConfig, Retry, RetryConfig};
pub use short_circuit::ShortCircuitIf;
pub use switch::Switch;
pub use timeout::{Timeout, TimeoutConfig};

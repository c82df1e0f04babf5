//! Timeout policy
//!
//! Bounds how long an operation may run by handing it a child context whose
//! deadline is `now + duration`. The operation observes the deadline through
//! the context it receives; the policy itself never interprets errors.

use crate::context::Context;
use crate::error::Result;
use crate::policy::{Operation, Policy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Time allowed per call in milliseconds
    pub duration_ms: u64,
}

impl TimeoutConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Timeout policy
#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn from_config(config: &TimeoutConfig) -> Self {
        Self::new(config.duration())
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

#[async_trait]
impl<T: Send + 'static> Policy<T> for Timeout {
    async fn call(&self, ctx: Context, op: Operation<T>) -> Result<T> {
        let bounded = ctx.with_timeout(self.duration);
        // Release the derived context however the call ends
        let _release = bounded.cancel_on_drop();

        op(bounded).await
    }
}

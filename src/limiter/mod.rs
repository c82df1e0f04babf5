//! Concurrency limiter
//!
//! Bounds how many guarded operations run at once with a fixed pool of slots.
//! A call waits for a free slot; if its context finishes while waiting, the
//! operation is skipped and the context's error is returned.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::policy::{Operation, Policy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Limiter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Maximum concurrent executions
    pub limit: usize,
}

/// Concurrency limiter policy.
///
/// Clones share the same slot pool.
#[derive(Debug, Clone)]
pub struct Limiter {
    slots: Arc<Semaphore>,
    limit: usize,
}

impl Limiter {
    /// Allow at most `limit` concurrent executions; zero is treated as one
    pub fn new(limit: usize) -> Self {
        let limit = limit.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            slots: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn from_config(config: &LimiterConfig) -> Self {
        Self::new(config.limit)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

#[async_trait]
impl<T: Send + 'static> Policy<T> for Limiter {
    async fn call(&self, ctx: Context, op: Operation<T>) -> Result<T> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        // The permit is released when dropped, on every exit path
        let _permit = tokio::select! {
            permit = self.slots.acquire() => match permit {
                Ok(permit) => permit,
                // Only reachable if the pool was closed
                Err(_) => return Err(Error::Canceled),
            },
            err = ctx.done() => {
                debug!(limit = self.limit, error = %err, "Gave up waiting for limiter slot");
                return Err(err);
            }
        };

        op(ctx).await
    }
}

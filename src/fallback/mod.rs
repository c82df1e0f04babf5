//! Fallback policy: replaces a failure with whatever an alternate handler produces.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::policy::{Operation, Policy};
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use tracing::debug;

/// Fallback policy
pub struct Fallback<F, T> {
    handler: F,
    _output: PhantomData<fn() -> T>,
}

impl<F, Fut, T> Fallback<F, T>
where
    F: Fn(Context, Error) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send,
{
    /// Call `handler` with the triggering error whenever the operation fails
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _output: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, T> Policy<T> for Fallback<F, T>
where
    T: Send + 'static,
    F: Fn(Context, Error) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    async fn call(&self, ctx: Context, op: Operation<T>) -> Result<T> {
        match op(ctx.clone()).await {
            Ok(value) => Ok(value),
            Err(err) => {
                debug!(error = %err, "Operation failed, using fallback");
                (self.handler)(ctx, err).await
            }
        }
    }
}

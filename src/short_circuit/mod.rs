//! Short-circuit policy
//!
//! Marks matching failures as final so that enclosing [`Retry`](crate::Retry)
//! layers give up at once. Place it inside the retry it should stop.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::policy::{Operation, Policy};
use async_trait::async_trait;
use tracing::debug;

pub struct ShortCircuitIf<P> {
    predicate: P,
}

impl<P> ShortCircuitIf<P>
where
    P: Fn(&Error) -> bool + Send + Sync,
{
    pub fn new(predicate: P) -> Self {
        Self { predicate }
    }
}

#[async_trait]
impl<T, P> Policy<T> for ShortCircuitIf<P>
where
    T: Send + 'static,
    P: Fn(&Error) -> bool + Send + Sync,
{
    async fn call(&self, ctx: Context, op: Operation<T>) -> Result<T> {
        match op(ctx).await {
            Err(err) if !err.is_short_circuit() && (self.predicate)(&err) => {
                debug!(error = %err, "Short-circuiting permanent failure");
                Err(Error::ShortCircuit(Box::new(err)))
            }
            other => other,
        }
    }
}

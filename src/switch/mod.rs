//! Switch policy
//!
//! Picks one of two policies before the operation runs, based on a predicate
//! over the context. Unlike [`Fallback`](crate::Fallback), which reacts after a
//! failure, the decision is made up front and the other branch is never touched.

use crate::context::Context;
use crate::error::Result;
use crate::policy::{Operation, Policy};
use async_trait::async_trait;
use tracing::debug;

pub struct Switch<C, A, B> {
    condition: C,
    primary: A,
    secondary: B,
}

impl<C, A, B> Switch<C, A, B>
where
    C: Fn(&Context) -> bool + Send + Sync,
{
    /// Use `primary` when `condition(ctx)` holds, `secondary` otherwise
    pub fn new(condition: C, primary: A, secondary: B) -> Self {
        Self {
            condition,
            primary,
            secondary,
        }
    }
}

#[async_trait]
impl<T, C, A, B> Policy<T> for Switch<C, A, B>
where
    T: Send + 'static,
    C: Fn(&Context) -> bool + Send + Sync,
    A: Policy<T>,
    B: Policy<T>,
{
    async fn call(&self, ctx: Context, op: Operation<T>) -> Result<T> {
        if (self.condition)(&ctx) {
            debug!(branch = "primary", "Switch selected policy");
            self.primary.call(ctx, op).await
        } else {
            debug!(branch = "secondary", "Switch selected policy");
            self.secondary.call(ctx, op).await
        }
    }
}

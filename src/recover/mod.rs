//! Recover policy
//!
//! A blunt safety net: if the operation panics, either while building its
//! future or while that future is polled, the panic is
//! swallowed and the call resolves to `Ok(T::default())`, the closest thing to
//! "no value and no error". The caller gets no diagnostic beyond a log line, so
//! this is no substitute for returning errors explicitly. Panics in tasks the
//! operation spawns itself are not intercepted.

use crate::context::Context;
use crate::error::Result;
use crate::policy::{Operation, Policy};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default)]
pub struct Recover;

impl Recover {
    pub fn new() -> Self {
        Self
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[async_trait]
impl<T> Policy<T> for Recover
where
    T: Default + Send + 'static,
{
    async fn call(&self, ctx: Context, op: Operation<T>) -> Result<T> {
        // The closure itself runs inside the guarded future
        match AssertUnwindSafe(async move { op(ctx).await })
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                warn!(
                    panic = panic_message(payload.as_ref()),
                    "Suppressed panic in guarded operation"
                );
                Ok(T::default())
            }
        }
    }
}

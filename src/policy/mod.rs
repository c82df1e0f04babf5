//! The uniform policy contract and its composition.
//!
//! Every resilience behavior in this crate implements [`Policy`]: it receives an
//! execution [`Context`] and an [`Operation`], and returns whatever the operation
//! (or the policy on its behalf) produced. Because input and output shapes are
//! identical for every policy, any policy can wrap any other, and a [`Chain`]
//! nests an ordered list of them around a single operation.
//!
//! # Example
//!
//! ```rust,no_run
//! use palisade::{Chain, CircuitBreaker, Context, Error, PolicyExt, Retry, Timeout};
//! use std::time::Duration;
//!
//! # async fn example() -> palisade::Result<()> {
//! let chain = Chain::new()
//!     .push(Retry::new(3))
//!     .push(CircuitBreaker::new(5))
//!     .push(Timeout::new(Duration::from_secs(2)));
//!
//! let value = chain
//!     .execute(Context::background(), |_ctx| async { Ok::<_, Error>(42) })
//!     .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use crate::context::Context;
use crate::error::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// A re-invocable unit of work guarded by policies
pub type Operation<T> = Arc<dyn Fn(Context) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Adapt an async closure into an [`Operation`]
pub fn operation<T, F, Fut>(f: F) -> Operation<T>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// Resilience behavior wrapped around an operation
#[async_trait]
pub trait Policy<T: Send + 'static>: Send + Sync {
    async fn call(&self, ctx: Context, op: Operation<T>) -> Result<T>;
}

#[async_trait]
impl<T, P> Policy<T> for Arc<P>
where
    T: Send + 'static,
    P: Policy<T> + ?Sized,
{
    async fn call(&self, ctx: Context, op: Operation<T>) -> Result<T> {
        (**self).call(ctx, op).await
    }
}

#[async_trait]
impl<T, P> Policy<T> for Box<P>
where
    T: Send + 'static,
    P: Policy<T> + ?Sized,
{
    async fn call(&self, ctx: Context, op: Operation<T>) -> Result<T> {
        (**self).call(ctx, op).await
    }
}

/// Run plain closures through a policy
pub trait PolicyExt<T: Send + 'static>: Policy<T> {
    fn execute<F, Fut>(&self, ctx: Context, f: F) -> BoxFuture<'_, Result<T>>
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.call(ctx, operation(f))
    }
}

impl<T: Send + 'static, P: Policy<T> + ?Sized> PolicyExt<T> for P {}

/// Policy backed by a function
pub struct PolicyFn<F> {
    f: F,
}

/// Build a policy from `f(ctx, op)`
pub fn policy_fn<T, F, Fut>(f: F) -> PolicyFn<F>
where
    T: Send + 'static,
    F: Fn(Context, Operation<T>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    PolicyFn { f }
}

#[async_trait]
impl<T, F, Fut> Policy<T> for PolicyFn<F>
where
    T: Send + 'static,
    F: Fn(Context, Operation<T>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    async fn call(&self, ctx: Context, op: Operation<T>) -> Result<T> {
        (self.f)(ctx, op).await
    }
}

/// Ordered composition of policies, outermost first
pub struct Chain<T> {
    policies: Vec<Arc<dyn Policy<T>>>,
}

impl<T: Send + 'static> Chain<T> {
    pub fn new() -> Self {
        Self {
            policies: Vec::new(),
        }
    }

    /// Append `policy` inside every policy already in the chain
    pub fn push<P>(mut self, policy: P) -> Self
    where
        P: Policy<T> + 'static,
    {
        self.policies.push(Arc::new(policy));
        self
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl<T: Send + 'static> Default for Chain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<Arc<dyn Policy<T>>>> for Chain<T> {
    fn from(policies: Vec<Arc<dyn Policy<T>>>) -> Self {
        Self { policies }
    }
}

impl<T> Clone for Chain<T> {
    fn clone(&self) -> Self {
        Self {
            policies: self.policies.clone(),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Policy<T> for Chain<T> {
    async fn call(&self, ctx: Context, op: Operation<T>) -> Result<T> {
        let wrapped = self.policies.iter().rev().fold(op, |inner, policy| {
            let policy = Arc::clone(policy);
            Arc::new(move |ctx: Context| {
                let policy = Arc::clone(&policy);
                let inner = Arc::clone(&inner);
                Box::pin(async move { policy.call(ctx, inner).await }) as BoxFuture<'static, Result<T>>
            }) as Operation<T>
        });

        wrapped(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Mutex;

    fn recorder(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> impl Policy<u32> {
        policy_fn(move |ctx: Context, op: Operation<u32>| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("enter {name}"));
                let result = op(ctx).await;
                log.lock().unwrap().push(format!("exit {name}"));
                result
            }
        })
    }

    #[tokio::test]
    async fn test_chain_runs_outermost_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = Chain::new()
            .push(recorder("a", Arc::clone(&log)))
            .push(recorder("b", Arc::clone(&log)))
            .push(recorder("c", Arc::clone(&log)));

        let inner_log = Arc::clone(&log);
        let result = chain
            .execute(Context::background(), move |_ctx| {
                let log = Arc::clone(&inner_log);
                async move {
                    log.lock().unwrap().push("op".to_string());
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["enter a", "enter b", "enter c", "op", "exit c", "exit b", "exit a"]
        );
    }

    #[tokio::test]
    async fn test_empty_chain_calls_operation() {
        let chain: Chain<u32> = Chain::new();
        assert!(chain.is_empty());

        let result = chain
            .execute(Context::background(), |_ctx| async { Err(Error::msg("boom")) })
            .await;
        assert_eq!(result.unwrap_err().to_string(), "boom");
    }

    #[tokio::test]
    async fn test_chain_passes_derived_context_down() {
        let narrowing = policy_fn(|ctx: Context, op: Operation<bool>| async move {
            let child = ctx.child();
            child.cancel();
            op(child).await
        });
        let chain = Chain::new().push(narrowing);

        let outer = Context::background();
        let saw_cancel = chain
            .execute(outer.clone(), |ctx| async move { Ok(ctx.is_done()) })
            .await
            .unwrap();

        assert!(saw_cancel);
        assert!(!outer.is_done());
    }

    #[tokio::test]
    async fn test_chain_from_vec_matches_push() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let policies: Vec<Arc<dyn Policy<u32>>> = vec![
            Arc::new(recorder("outer", Arc::clone(&log))),
            Arc::new(recorder("inner", Arc::clone(&log))),
        ];
        let chain = Chain::from(policies);
        assert_eq!(chain.len(), 2);

        chain
            .execute(Context::background(), |_ctx| async { Ok(1) })
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["enter outer", "enter inner", "exit inner", "exit outer"]
        );
    }
}

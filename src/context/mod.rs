//! Execution context threaded through every policy layer.
//!
//! A [`Context`] carries a cancellation signal and an optional deadline. Layers
//! that need a narrower scope derive a child with [`Context::child`] or
//! [`Context::with_timeout`]; cancelling a parent cancels all of its children,
//! never the other way around.

use crate::error::Error;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Cancellation-aware execution context
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Root context: never cancelled unless [`cancel`](Self::cancel) is called
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Derive a child that can be cancelled on its own
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derive a child whose deadline is `now + timeout` or the parent's, whichever is earlier
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            // Too far out to represent; no tighter than the parent
            None => self.child(),
        }
    }

    /// Derive a child bounded by `deadline`
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };

        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and every context derived from it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Guard that cancels this context when dropped
    pub fn cancel_on_drop(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Why the context is done, if it is
    pub fn err(&self) -> Option<Error> {
        if self.token.is_cancelled() {
            return Some(Error::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Error::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn done(&self) -> Error {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => Error::Canceled,
                    _ = sleep_until(deadline) => Error::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                Error::Canceled
            }
        }
    }

    /// Sleep for `duration` unless the context finishes first
    pub async fn sleep(&self, duration: Duration) -> Result<(), Error> {
        if let Some(err) = self.err() {
            return Err(err);
        }

        tokio::select! {
            err = self.done() => Err(err),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_is_never_done() {
        let ctx = Context::background();
        assert!(!ctx.is_done());
        assert!(ctx.err().is_none());
        assert!(ctx.deadline().is_none());
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_children_only() {
        let parent = Context::background();
        let child = parent.child();
        let sibling = parent.child();

        child.cancel();
        assert!(matches!(child.err(), Some(Error::Canceled)));
        assert!(!parent.is_done());
        assert!(!sibling.is_done());

        parent.cancel();
        assert!(matches!(sibling.err(), Some(Error::Canceled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_earlier_parent_deadline() {
        let parent = Context::background().with_timeout(Duration::from_millis(50));
        let child = parent.with_timeout(Duration::from_secs(10));
        assert_eq!(child.deadline(), parent.deadline());

        let narrower = parent.with_timeout(Duration::from_millis(10));
        assert!(narrower.deadline() < parent.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_fires_at_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_millis(100));
        let start = Instant::now();

        let err = ctx.done().await;

        assert!(matches!(err, Error::DeadlineExceeded));
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(matches!(ctx.err(), Some(Error::DeadlineExceeded)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_cancel() {
        let ctx = Context::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let result = ctx.sleep(Duration::from_secs(60)).await;

        assert!(matches!(result, Err(Error::Canceled)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_drop_guard_cancels() {
        let ctx = Context::background().child();
        {
            let _guard = ctx.cancel_on_drop();
            assert!(!ctx.is_done());
        }
        assert!(ctx.is_done());
    }
}

//! Cancellation and deadlines for storage operations.
//!
//! A [`Context`] travels with every engine call. Each store request and each
//! rate-limiter wait runs through [`Context::run`], so a cancelled or expired
//! context stops the operation with [`Error::Cancelled`] instead of a
//! truncated success.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::storage::{CancelReason, Error, Result};

/// Cancel signal plus optional deadline.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Cancels every [`Context`] derived from it.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A cancellable context and the handle that cancels it.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        let context = Self {
            cancelled: Some(receiver),
            deadline: None,
        };
        (context, CancelHandle { sender })
    }

    /// Derives a context that also expires after `timeout`.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a context that also expires at `deadline`. The earlier deadline wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns why the context is done, if it is.
    pub fn done(&self) -> Option<CancelReason> {
        if self.cancelled.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Some(CancelReason::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(CancelReason::DeadlineExceeded);
        }
        None
    }

    /// Fails with [`Error::Cancelled`] when the context is done.
    pub fn check(&self) -> Result<()> {
        match self.done() {
            Some(reason) => Err(Error::Cancelled(reason)),
            None => Ok(()),
        }
    }

    /// Drives `future` until it completes or the context is done.
    ///
    /// Cancellation wins over a future that is ready at the same time.
    pub async fn run<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        self.check()?;
        tokio::select! {
            biased;
            reason = self.wait_done() => Err(Error::Cancelled(reason)),
            value = future => Ok(value),
        }
    }

    async fn wait_done(&self) -> CancelReason {
        let cancelled = async {
            match self.cancelled.clone() {
                Some(mut rx) => {
                    // A dropped handle can no longer cancel.
                    let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
                    if closed {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = cancelled => CancelReason::Cancelled,
            _ = expired => CancelReason::DeadlineExceeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_never_cancels() {
        let ctx = Context::background();
        assert!(ctx.check().is_ok());
        assert_eq!(ctx.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn test_cancelled_before_run() {
        let (ctx, handle) = Context::with_cancel();
        handle.cancel();

        assert_eq!(ctx.check(), Err(Error::Cancelled(CancelReason::Cancelled)));
        assert_eq!(
            ctx.run(async { 7 }).await,
            Err(Error::Cancelled(CancelReason::Cancelled))
        );
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_future() {
        let (ctx, handle) = Context::with_cancel();
        let task = tokio::spawn(async move {
            ctx.run(std::future::pending::<()>()).await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();

        assert_eq!(
            task.await.unwrap(),
            Err(Error::Cancelled(CancelReason::Cancelled))
        );
    }

    #[tokio::test]
    async fn test_deadline_interrupts_pending_future() {
        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        let result = ctx.run(std::future::pending::<()>()).await;

        assert_eq!(result, Err(Error::Cancelled(CancelReason::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_cancel() {
        let (ctx, handle) = Context::with_cancel();
        drop(handle);

        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                "done"
            })
            .await;
        assert_eq!(result, Ok("done"));
    }

    #[test]
    fn test_earlier_deadline_wins() {
        let now = Instant::now();
        let ctx = Context::background()
            .with_deadline(now + Duration::from_secs(10))
            .with_deadline(now + Duration::from_secs(1));

        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(1)));
    }
}

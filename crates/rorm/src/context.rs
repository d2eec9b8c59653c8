use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rorm_store::StoreResult;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::OrmConfig;
use crate::error::{OrmError, OrmResult};

/// Cancellation and deadline carrier threaded through every store call.
///
/// Contexts derived from one another with [`with_timeout`](Self::with_timeout)
/// or [`with_deadline`](Self::with_deadline) share a single cancellation
/// signal; each keeps its own deadline, never later than its parent's.
#[derive(Clone, Debug)]
pub struct Context {
    deadline: Option<Instant>,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl Context {
    /// A context with no deadline that is cancelled only explicitly.
    pub fn background() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            deadline: None,
            cancel_tx: Arc::new(tx),
            cancel_rx: rx,
        }
    }

    /// A background context carrying the configured operation timeout.
    pub fn from_config(config: &OrmConfig) -> Self {
        let ctx = Self::background();
        match config.operation_timeout() {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            cancel_tx: Arc::clone(&self.cancel_tx),
            cancel_rx: self.cancel_rx.clone(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and every context sharing its signal.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Check cancellation and deadline without running anything.
    pub fn check(&self) -> OrmResult<()> {
        if self.is_cancelled() {
            return Err(OrmError::Cancelled);
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(OrmError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run one store call, giving up on cancellation or at the deadline.
    pub async fn run<F, T>(&self, call: F) -> OrmResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        self.check()?;
        let mut cancel_rx = self.cancel_rx.clone();
        let guarded = async {
            tokio::select! {
                result = call => result.map_err(OrmError::from),
                _ = wait_cancelled(&mut cancel_rx) => Err(OrmError::Cancelled),
            }
        };
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, guarded)
                .await
                .unwrap_or(Err(OrmError::DeadlineExceeded)),
            None => guarded.await,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_passes_results_through() {
        let ctx = Context::background();
        let value = ctx.run(async { Ok::<_, rorm_store::StoreError>(7) }).await.unwrap();
        assert_eq!(value, 7);

        let err = ctx
            .run(async { Err::<(), _>(rorm_store::StoreError::Closed) })
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::Store(rorm_store::StoreError::Closed)));
    }

    #[tokio::test]
    async fn cancelled_context_rejects_before_running() {
        let ctx = Context::background();
        ctx.cancel();
        let err = ctx
            .run(async { Ok::<_, rorm_store::StoreError>(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::Cancelled));
    }

    #[tokio::test]
    async fn cancel_interrupts_pending_call() {
        let ctx = Context::background();
        let child = ctx.clone();
        let handle = tokio::spawn(async move {
            child
                .run(async {
                    std::future::pending::<()>().await;
                    Ok::<_, rorm_store::StoreError>(())
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        ctx.cancel();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(OrmError::Cancelled)));
    }

    #[tokio::test]
    async fn deadline_interrupts_pending_call() {
        let ctx = Context::background().with_timeout(Duration::from_millis(10));
        let err = ctx
            .run(async {
                std::future::pending::<()>().await;
                Ok::<_, rorm_store::StoreError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn child_deadline_never_exceeds_parent() {
        let parent = Context::background().with_timeout(Duration::from_millis(50));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());

        child.cancel();
        assert!(parent.is_cancelled());
    }

    #[tokio::test]
    async fn from_config_applies_timeout() {
        let config = OrmConfig {
            operation_timeout_ms: Some(1_000),
            ..OrmConfig::default()
        };
        assert!(Context::from_config(&config).deadline().is_some());
        assert!(Context::from_config(&OrmConfig::default()).deadline().is_none());
    }
}

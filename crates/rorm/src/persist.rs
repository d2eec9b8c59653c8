//! Supervised background persistence of auto-loaded records.

use std::sync::Arc;

use rorm_store::{HashStore, Pipeline, StoreError};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::context::Context;
use crate::error::{OrmError, OrmResult};

/// Handle to the background write of a record computed by auto-load.
///
/// The write runs on its own task and inherits the cancellation signal and
/// deadline of the context the lookup ran under. Failures are logged when
/// they happen and are also returned from [`wait`](Self::wait). Dropping the
/// handle detaches the task; the write still runs to completion.
#[derive(Debug)]
pub struct PersistHandle {
    key: String,
    task: JoinHandle<OrmResult<()>>,
}

impl PersistHandle {
    pub(crate) fn spawn(
        store: Arc<dyn HashStore>,
        ctx: Context,
        key: String,
        pipeline: Pipeline,
    ) -> Self {
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let expected = pipeline.len();
            let result = match ctx.run(store.execute(&pipeline)).await {
                Ok(replies) if replies.len() == expected => Ok(()),
                Ok(replies) => Err(OrmError::Store(StoreError::ReplyCount {
                    expected,
                    actual: replies.len(),
                })),
                Err(e) => Err(e),
            };
            match &result {
                Ok(()) => debug!(key = %task_key, commands = expected, "auto-loaded record persisted"),
                Err(e) => error!(key = %task_key, error = %e, "auto-loaded record was not persisted"),
            }
            result
        });
        Self { key, task }
    }

    /// Key of the record being written.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the write if it has not completed yet.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the write and return its outcome.
    pub async fn wait(self) -> OrmResult<()> {
        match self.task.await {
            Ok(result) => result,
            Err(join) if join.is_cancelled() => {
                Err(OrmError::Persist(format!("write of {} was aborted", self.key)))
            }
            Err(join) => Err(OrmError::Persist(join.to_string())),
        }
    }
}

use async_trait::async_trait;

use crate::command::{HashRecord, Pipeline, Reply, ScanPage};
use crate::error::{StoreError, StoreResult};

/// Hash-structured key-value store.
///
/// All implementations must satisfy these invariants:
/// - `execute` returns exactly one reply per staged command, in order.
/// - A pipeline that fails returns `Err` for the whole batch; callers get no
///   per-command success report.
/// - `scan` pages are driven by the returned cursor until it comes back as
///   [`SCAN_START`](crate::SCAN_START). Every key that exists for the whole
///   duration of the scan is returned at least once.
/// - All transport errors are propagated, never silently ignored.
#[async_trait]
pub trait HashStore: Send + Sync {
    /// Submit a pipeline in one round trip and return one reply per command.
    async fn execute(&self, pipeline: &Pipeline) -> StoreResult<Vec<Reply>>;

    /// Fetch one page of keys matching the glob `pattern`, starting at `cursor`.
    ///
    /// `count` is a hint for how much of the keyspace to visit per call.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> StoreResult<ScanPage>;

    /// Read every field of the hash at `key`. An absent key yields an empty map.
    async fn hget_all(&self, key: &str) -> StoreResult<HashRecord> {
        let mut pipe = Pipeline::new();
        pipe.hget_all(key);
        single_reply(self.execute(&pipe).await?)?.into_hash()
    }

    /// Read one field of the hash at `key`.
    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut pipe = Pipeline::new();
        pipe.hget(key, field);
        single_reply(self.execute(&pipe).await?)?.into_value()
    }

    /// Check whether `key` exists.
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut pipe = Pipeline::new();
        pipe.exists(key);
        Ok(single_reply(self.execute(&pipe).await?)?.into_integer()? > 0)
    }
}

fn single_reply(mut replies: Vec<Reply>) -> StoreResult<Reply> {
    if replies.len() != 1 {
        return Err(StoreError::ReplyCount {
            expected: 1,
            actual: replies.len(),
        });
    }
    Ok(replies.remove(0))
}

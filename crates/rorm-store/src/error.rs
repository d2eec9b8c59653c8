/// Errors from hash store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The transport failed to deliver a command or a reply.
    #[error("transport error: {0}")]
    Transport(String),

    /// A reply did not have the shape the issuing command promises.
    #[error("unexpected reply to {command}: expected {expected}")]
    UnexpectedReply {
        command: &'static str,
        expected: &'static str,
    },

    /// The number of replies does not match the number of commands sent.
    #[error("pipeline returned {actual} replies for {expected} commands")]
    ReplyCount { expected: usize, actual: usize },

    /// The store handle has been closed.
    #[error("store is closed")]
    Closed,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

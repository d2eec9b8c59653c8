use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::{StoreError, StoreResult};

/// The on-store representation of one record: field name to encoded text.
pub type HashRecord = HashMap<String, String>;

/// Cursor value a scan starts from, and the value that signals completion.
pub const SCAN_START: u64 = 0;

/// A single store command that can be staged into a [`Pipeline`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Set one hash field. Replies with `Integer(1)` when the field is new.
    HSet {
        key: String,
        field: String,
        value: String,
    },
    /// Remove one hash field. Replies with `Integer(1)` when the field existed.
    /// A hash left with no fields is removed with its key.
    HDel { key: String, field: String },
    /// Read one hash field. Replies with `Value(None)` when absent.
    HGet { key: String, field: String },
    /// Read every field of a hash. Replies with an empty hash when absent.
    HGetAll { key: String },
    /// Key existence check. Replies with `Integer(0 | 1)`.
    Exists { key: String },
    /// Set a time-to-live on a key. Replies with `Integer(1)` when applied.
    Expire { key: String, ttl: Duration },
}

impl Command {
    /// Protocol name of the command, used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Command::HSet { .. } => "HSET",
            Command::HDel { .. } => "HDEL",
            Command::HGet { .. } => "HGET",
            Command::HGetAll { .. } => "HGETALL",
            Command::Exists { .. } => "EXISTS",
            Command::Expire { .. } => "EXPIRE",
        }
    }

    /// The key this command addresses.
    pub fn key(&self) -> &str {
        match self {
            Command::HSet { key, .. }
            | Command::HDel { key, .. }
            | Command::HGet { key, .. }
            | Command::HGetAll { key }
            | Command::Exists { key }
            | Command::Expire { key, .. } => key,
        }
    }

    /// Returns `true` if the command mutates the store.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Command::HSet { .. } | Command::HDel { .. } | Command::Expire { .. }
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::HSet { key, field, .. } => write!(f, "HSET {key} {field}"),
            Command::HDel { key, field } => write!(f, "HDEL {key} {field}"),
            Command::HGet { key, field } => write!(f, "HGET {key} {field}"),
            Command::HGetAll { key } => write!(f, "HGETALL {key}"),
            Command::Exists { key } => write!(f, "EXISTS {key}"),
            Command::Expire { key, ttl } => write!(f, "EXPIRE {key} {}", ttl.as_secs()),
        }
    }
}

/// A reply to a single [`Command`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Integer(i64),
    Value(Option<String>),
    Hash(HashRecord),
}

impl Reply {
    /// Interpret the reply as a hash (reply to `HGETALL`).
    pub fn into_hash(self) -> StoreResult<HashRecord> {
        match self {
            Reply::Hash(hash) => Ok(hash),
            _ => Err(StoreError::UnexpectedReply {
                command: "HGETALL",
                expected: "hash",
            }),
        }
    }

    /// Interpret the reply as an optional bulk value (reply to `HGET`).
    pub fn into_value(self) -> StoreResult<Option<String>> {
        match self {
            Reply::Value(value) => Ok(value),
            _ => Err(StoreError::UnexpectedReply {
                command: "HGET",
                expected: "bulk value",
            }),
        }
    }

    /// Interpret the reply as an integer (reply to `HSET`, `EXISTS`, `EXPIRE`).
    pub fn into_integer(self) -> StoreResult<i64> {
        match self {
            Reply::Integer(n) => Ok(n),
            _ => Err(StoreError::UnexpectedReply {
                command: "EXISTS",
                expected: "integer",
            }),
        }
    }
}

/// An ordered batch of commands submitted together in one round trip.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pipeline {
    commands: Vec<Command>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an arbitrary command.
    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn hset(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.push(Command::HSet {
            key: key.into(),
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn hdel(&mut self, key: impl Into<String>, field: impl Into<String>) -> &mut Self {
        self.push(Command::HDel {
            key: key.into(),
            field: field.into(),
        })
    }

    pub fn hget(&mut self, key: impl Into<String>, field: impl Into<String>) -> &mut Self {
        self.push(Command::HGet {
            key: key.into(),
            field: field.into(),
        })
    }

    pub fn hget_all(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::HGetAll { key: key.into() })
    }

    pub fn exists(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::Exists { key: key.into() })
    }

    pub fn expire(&mut self, key: impl Into<String>, ttl: Duration) -> &mut Self {
        self.push(Command::Expire {
            key: key.into(),
            ttl,
        })
    }

    /// Append every command staged in `other`, preserving order.
    pub fn append(&mut self, other: Pipeline) -> &mut Self {
        self.commands.extend(other.commands);
        self
    }

    /// Staged commands, in submission order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of staged commands that mutate the store.
    pub fn write_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_write()).count()
    }
}

/// One page of a cursor-based key scan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Keys matched in this page. May be empty even when the scan continues.
    pub keys: Vec<String>,
    /// Cursor for the next call; [`SCAN_START`] means the scan is complete.
    pub cursor: u64,
}

impl ScanPage {
    /// Returns `true` if this is the final page of the scan.
    pub fn is_last(&self) -> bool {
        self.cursor == SCAN_START
    }
}

//! Hash-structured key-value store protocol consumed by rorm.
//!
//! The object mapper never talks to a concrete server. It needs exactly two
//! capabilities from the layer below it, and this crate defines them:
//!
//! - batched hash-field reads and writes submitted as one [`Pipeline`]
//!   (`HSET`, `HGET`, `HGETALL`, `EXISTS`, `EXPIRE`), and
//! - a cursor-based key-pattern scan returning a [`ScanPage`].
//!
//! # Storage Backends
//!
//! All backends implement the [`HashStore`] trait:
//!
//! - [`InMemoryHashStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. A pipeline delivers its commands in order, in a single round trip.
//! 2. A pipeline either applies every command or fails as a whole; there is
//!    no partial-success reporting.
//! 3. A scan is complete when the returned cursor is `0`, the same value a
//!    scan starts from.
//! 4. Scan order is backend-defined. Callers must not rely on it.
//! 5. All transport errors are propagated, never silently ignored.

pub mod command;
pub mod error;
pub mod memory;
pub mod pattern;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use command::{Command, HashRecord, Pipeline, Reply, ScanPage, SCAN_START};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryHashStore;
pub use pattern::glob_match;
pub use traits::HashStore;

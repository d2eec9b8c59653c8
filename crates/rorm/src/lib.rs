//! Typed object mapping over hash-structured key-value stores.
//!
//! Records are plain structs deriving [`Record`]. Each record is stored as one
//! hash under a key derived from its type name and primary fields; nested
//! records live under their own keys and are linked by foreign-key fields.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use rorm::{InMemoryHashStore, Orm, Record};
//!
//! #[derive(Debug, Default, Record)]
//! struct User {
//!     #[redis("primary")]
//!     id: String,
//!     age: u32,
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let orm = Orm::new(Arc::new(InMemoryHashStore::new()));
//! let ctx = orm.context();
//!
//! let user = User { id: "u1".into(), age: 30 };
//! orm.query().create(&ctx, &user).await.unwrap();
//!
//! let mut found = User { id: "u1".into(), ..User::default() };
//! orm.query().find(&ctx, &mut found).await.unwrap();
//! assert_eq!(found.age, 30);
//! # });
//! ```

extern crate self as rorm;

pub mod association;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod key;
pub mod mapper;
pub mod model;
pub mod orm;
pub mod persist;
pub mod query;
pub mod schema;
pub mod updates;

pub use rorm_derive::Record;
pub use rorm_store as store;
pub use rorm_store::{
    glob_match, HashRecord, HashStore, InMemoryHashStore, Pipeline, Reply, ScanPage, StoreError,
    StoreResult,
};

pub use codec::{decode_into, Decoded, Encoded, FieldValue, SkipReason};
pub use config::OrmConfig;
pub use context::Context;
pub use error::{CodecError, CodecResult, LoadError, OrmError, OrmResult};
pub use key::derive_key;
pub use model::{AutoLoad, Model, Record};
pub use orm::Orm;
pub use persist::PersistHandle;
pub use query::{FindOutcome, Query};
pub use schema::{FieldDescriptor, FieldDirectives, FieldKind, RecordSchema};
pub use updates::FieldUpdates;

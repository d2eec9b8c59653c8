//! Record traits.
//!
//! [`Model`] is the object-safe view of a record that the mapper, the key
//! deriver and the association resolver operate on. [`Record`] adds the
//! statically known schema and zero value. Both are normally generated with
//! `#[derive(Record)]`.

use std::any::Any;

use crate::codec::{Decoded, Encoded};
use crate::error::{CodecResult, LoadError};
use crate::schema::RecordSchema;

/// Object-safe access to a record's fields by descriptor index.
///
/// Indices refer to [`RecordSchema::fields`]. Out-of-range indices encode as
/// [`Encoded::Null`] and decode as a skip.
pub trait Model: Any + Send + Sync {
    fn schema(&self) -> &'static RecordSchema;

    fn encode_field(&self, index: usize) -> CodecResult<Encoded>;

    fn decode_field(&mut self, index: usize, text: &str) -> CodecResult<Decoded<()>>;

    /// Text of the field as it appears in an identity key.
    fn field_key_text(&self, index: usize) -> String;

    /// The nested record held by a record-kind field, if present.
    fn nested_model(&self, index: usize) -> Option<&dyn Model>;

    /// Store a loaded nested record into a record-kind field.
    fn attach_nested(&mut self, index: usize, nested: Box<dyn Model>) -> bool;

    /// Compute the record's data when the store has none.
    ///
    /// `None` when the type has no auto-load capability.
    fn auto_load(&mut self) -> Option<Result<(), LoadError>> {
        None
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// A record type with a static schema and a zero value.
pub trait Record: Model + Default {
    fn record_schema() -> &'static RecordSchema;
}

/// Capability to compute a record in memory when the store holds no data.
///
/// Enabled on a derived record with `#[redis(loader)]`. The record's primary
/// fields are already set when `load` is called.
pub trait AutoLoad {
    fn load(&mut self) -> Result<(), LoadError>;
}

/// Move `nested` into `slot` if it is a `R`.
pub fn attach_record<R: Record>(slot: &mut R, nested: Box<dyn Model>) -> bool {
    match nested.into_any().downcast::<R>() {
        Ok(record) => {
            *slot = *record;
            true
        }
        Err(_) => false,
    }
}

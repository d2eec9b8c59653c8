//! Record mapper: whole-record conversion between a [`Model`] and its hash.
//!
//! Writing stages one `HSET` per stored field into a [`Pipeline`]; nested
//! records are staged under their own keys into the same pipeline when
//! association is enabled. Reading decodes every declared field present in
//! the hash and leaves the rest at their current (zero) value.

use std::time::Duration;

use rorm_store::{HashRecord, Pipeline};
use tracing::{debug, trace, warn};

use crate::codec::{Decoded, Encoded, SkipReason};
use crate::error::{OrmError, OrmResult};
use crate::key::derive_key;
use crate::model::Model;
use crate::schema::FieldDescriptor;

/// How a record is staged for writing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MarshalOptions {
    /// Stage nested records under their own keys.
    pub association: bool,
    /// Expiry staged after the field writes of every record.
    pub ttl: Option<Duration>,
}

/// Stage a full write of `model` into a new pipeline.
pub fn marshal(model: &dyn Model, options: MarshalOptions) -> OrmResult<Pipeline> {
    let mut pipe = Pipeline::new();
    marshal_into(&mut pipe, model, options)?;
    Ok(pipe)
}

/// Stage a full write of `model` into `pipe` and return its key.
pub fn marshal_into(
    pipe: &mut Pipeline,
    model: &dyn Model,
    options: MarshalOptions,
) -> OrmResult<String> {
    let key = derive_key(model)?;
    let schema = model.schema();

    for (index, field) in schema.fields().iter().enumerate() {
        if field.directives.skip {
            continue;
        }
        let encoded = model
            .encode_field(index)
            .map_err(|e| OrmError::codec(field.name, e))?;
        stage_encoded(pipe, &key, field, encoded, model.nested_model(index), options)?;
    }

    if let Some(ttl) = options.ttl.filter(|ttl| !ttl.is_zero()) {
        pipe.expire(key.as_str(), ttl);
    }
    debug!(key = %key, staged = pipe.len(), "record staged");
    Ok(key)
}

/// Stage one already-encoded field value.
pub(crate) fn stage_encoded(
    pipe: &mut Pipeline,
    key: &str,
    field: &FieldDescriptor,
    encoded: Encoded,
    nested: Option<&dyn Model>,
    options: MarshalOptions,
) -> OrmResult<()> {
    match encoded {
        Encoded::Text(text) => {
            pipe.hset(key, field.name, text);
        }
        Encoded::Null => trace!(key, field = field.name, "nil field not written"),
        Encoded::Record => match nested {
            Some(nested) if options.association => {
                marshal_into(pipe, nested, options)?;
            }
            Some(_) => trace!(key, field = field.name, "nested record skipped without association"),
            None => trace!(key, field = field.name, "empty nested record not written"),
        },
        Encoded::Skip(reason) => log_skip(key, field, reason),
    }
    Ok(())
}

fn log_skip(key: &str, field: &FieldDescriptor, reason: SkipReason) {
    match reason {
        SkipReason::PointerToPointer => warn!(
            key,
            field = field.name,
            "pointer to pointer cannot be stored; field skipped"
        ),
        SkipReason::Unsupported => warn!(
            key,
            field = field.name,
            kind = %field.kind,
            "field kind has no stored form; field skipped"
        ),
        SkipReason::Association => {}
    }
}

/// Encode the stored fields of `model` into a hash, without nested records.
pub fn to_hash(model: &dyn Model) -> OrmResult<HashRecord> {
    let schema = model.schema();
    let mut hash = HashRecord::with_capacity(schema.fields().len());
    for (index, field) in schema.fields().iter().enumerate() {
        if field.directives.skip {
            continue;
        }
        let encoded = model
            .encode_field(index)
            .map_err(|e| OrmError::codec(field.name, e))?;
        if let Encoded::Text(text) = encoded {
            hash.insert(field.name.to_string(), text);
        }
    }
    Ok(hash)
}

/// Decode every declared field present in `hash` into `model`.
///
/// Nested-record fields are left to association loading. The first decode
/// error aborts the whole record.
pub fn unmarshal(hash: &HashRecord, model: &mut dyn Model) -> OrmResult<()> {
    let schema = model.schema();
    for (index, field) in schema.fields().iter().enumerate() {
        if field.kind.is_record() {
            continue;
        }
        let Some(text) = hash.get(field.name) else {
            continue;
        };
        let outcome = model
            .decode_field(index, text)
            .map_err(|e| OrmError::codec(field.name, e))?;
        match outcome {
            Decoded::Value(()) => {}
            Decoded::Skip(SkipReason::PointerToPointer) => warn!(
                type_name = schema.type_name(),
                field = field.name,
                "pointer to pointer cannot be loaded; field left untouched"
            ),
            Decoded::Skip(_) => warn!(
                type_name = schema.type_name(),
                field = field.name,
                kind = %field.kind,
                "field kind cannot be loaded; field left untouched"
            ),
        }
    }
    Ok(())
}

//! Identity key derivation.
//!
//! Key format:
//!
//! ```text
//! <TypeFullName>/<Field>/<Value>[/<Field>/<Value>...]
//! ```
//!
//! with one `/<Field>/<Value>` segment per primary-tagged field, in
//! declaration order. The key is both the store address and the logical
//! record identifier.

use tracing::warn;

use crate::error::{OrmError, OrmResult};
use crate::model::Model;

/// Derive the identity key of `model`.
///
/// Fails with [`OrmError::PrimaryKeyNotFound`] if the type declares no
/// primary field.
pub fn derive_key(model: &dyn Model) -> OrmResult<String> {
    let schema = model.schema();
    if schema.fields().is_empty() {
        return Err(OrmError::ModelMustBeStruct {
            type_name: schema.type_name().to_string(),
        });
    }

    let mut suffix = String::new();
    for (index, field) in schema.primary_fields() {
        suffix.push('/');
        suffix.push_str(field.name);
        suffix.push('/');
        suffix.push_str(&model.field_key_text(index));
    }
    if suffix.is_empty() {
        return Err(OrmError::PrimaryKeyNotFound(format!(
            "{} declares no primary field",
            schema.type_name()
        )));
    }

    Ok(format!("{}{suffix}", schema.type_name()))
}

/// Key text of a nested record used as a primary field of its owner.
///
/// A nested record with no identity of its own contributes an empty segment.
pub fn nested_key_text(model: &dyn Model) -> String {
    derive_key(model).unwrap_or_else(|e| {
        warn!(
            type_name = model.schema().type_name(),
            error = %e,
            "nested record has no identity; owner key segment left empty"
        );
        String::new()
    })
}

/// Returns `true` if `key` addresses a record of the type named `type_name`.
pub fn belongs_to(key: &str, type_name: &str) -> bool {
    key.strip_prefix(type_name)
        .is_some_and(|rest| rest.starts_with('/'))
}

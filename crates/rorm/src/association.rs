//! Association resolver: populates nested-record fields tagged `foreignKey`.
//!
//! For each such field the nested record's primary field is set from the
//! owner's foreign-key field, the nested record's own hash is fetched by its
//! derived key, decoded, resolved recursively, and attached to the owner.

use std::future::Future;
use std::pin::Pin;

use rorm_store::HashStore;
use tracing::{debug, trace, warn};

use crate::codec::Encoded;
use crate::context::Context;
use crate::error::{OrmError, OrmResult};
use crate::key::derive_key;
use crate::mapper::unmarshal;
use crate::model::Model;
use crate::schema::FieldDescriptor;

type ResolveFuture<'a> = Pin<Box<dyn Future<Output = OrmResult<()>> + Send + 'a>>;

/// Load every foreign-key nested record of `model`.
///
/// Fails with [`OrmError::AssociationCycle`] when a key reappears on the
/// current nesting path or nesting goes deeper than `max_depth`. A nested
/// record with no stored data leaves its field unpopulated.
pub async fn resolve(
    store: &dyn HashStore,
    ctx: &Context,
    model: &mut dyn Model,
    max_depth: usize,
) -> OrmResult<()> {
    let mut path = vec![derive_key(model)?];
    resolve_fields(store, ctx, model, &mut path, max_depth).await
}

fn resolve_fields<'a>(
    store: &'a dyn HashStore,
    ctx: &'a Context,
    model: &'a mut dyn Model,
    path: &'a mut Vec<String>,
    max_depth: usize,
) -> ResolveFuture<'a> {
    Box::pin(async move {
        let schema = model.schema();
        for (index, field) in schema.fields().iter().enumerate() {
            if !field.kind.is_record() {
                continue;
            }
            let Some(owner) = field.directives.foreign_key.as_deref() else {
                warn!(
                    type_name = schema.type_name(),
                    field = field.name,
                    "nested record has no foreignKey directive; field left unpopulated"
                );
                continue;
            };
            let Some(mut nested) = seed_nested(model, field, owner)? else {
                continue;
            };

            let nested_key = derive_key(nested.as_ref())?;
            let depth = path.len();
            if depth > max_depth || path.contains(&nested_key) {
                return Err(OrmError::AssociationCycle {
                    key: nested_key,
                    depth,
                });
            }

            let hash = ctx.run(store.hget_all(&nested_key)).await?;
            if hash.is_empty() {
                warn!(
                    key = %nested_key,
                    field = field.name,
                    "associated record has no stored data; field left unpopulated"
                );
                continue;
            }
            unmarshal(&hash, nested.as_mut())?;

            path.push(nested_key);
            let resolved = resolve_fields(store, ctx, nested.as_mut(), path, max_depth).await;
            let nested_key = path.pop().unwrap_or_default();
            resolved?;

            if !model.attach_nested(index, nested) {
                return Err(OrmError::PointerRequired {
                    field: field.name.to_string(),
                });
            }
            debug!(key = %nested_key, field = field.name, depth, "association loaded");
        }
        Ok(())
    })
}

/// A fresh nested record whose primary field holds the owner's foreign key.
///
/// `None` when there is nothing to look up: the foreign key is unset, or the
/// nested type cannot be addressed.
fn seed_nested(
    model: &dyn Model,
    field: &FieldDescriptor,
    owner: &str,
) -> OrmResult<Option<Box<dyn Model>>> {
    let schema = model.schema();
    let Some(nested_schema) = field.nested_schema() else {
        return Ok(None);
    };
    let Some(owner_index) = schema.index_of(owner) else {
        warn!(
            type_name = schema.type_name(),
            field = field.name,
            owner,
            "foreignKey refers to an undeclared field; association skipped"
        );
        return Ok(None);
    };
    let Some(primary_index) = nested_schema.first_primary() else {
        warn!(
            type_name = nested_schema.type_name(),
            field = field.name,
            "associated record type declares no primary field; association skipped"
        );
        return Ok(None);
    };

    let text = match model
        .encode_field(owner_index)
        .map_err(|e| OrmError::codec(owner, e))?
    {
        Encoded::Text(text) => text,
        _ => {
            trace!(field = field.name, owner, "foreign key unset; association skipped");
            return Ok(None);
        }
    };

    let mut nested = nested_schema.instantiate();
    let primary = &nested_schema.fields()[primary_index];
    nested
        .decode_field(primary_index, &text)
        .map_err(|e| OrmError::codec(primary.name, e))?;
    Ok(Some(nested))
}

use proc_macro::TokenStream;

mod attrs;
mod record;

/// Derive `Model`, `Record` and `FieldValue` for a struct with named fields.
///
/// Struct attributes:
/// - `#[redis(name = "app::User")]` overrides the type name used in keys.
/// - `#[redis(loader)]` routes auto-load to the type's `AutoLoad` impl.
///
/// Field attributes:
/// - `#[redis("primary;foreignKey:OwnerID;-")]` carries the tag directives.
/// - `#[redis(tag = "...", rename = "ID")]` is the long form; `rename` sets the
///   stored field name.
#[proc_macro_derive(Record, attributes(redis))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    record::derive_record(input.into()).into()
}

//! Type-directed field codec.
//!
//! [`FieldValue`] converts one field between its in-memory type and the text
//! stored in a hash field:
//!
//! | Kind                          | Stored text                             |
//! |-------------------------------|-----------------------------------------|
//! | `bool`                        | `"1"` / `"0"` (any other text reads false) |
//! | integers, floats              | decimal text that parses back exactly   |
//! | `String`, `char`              | verbatim                                |
//! | `Vec`, arrays, sets, maps     | JSON                                    |
//! | `Option<T>`                   | as `T`; `None` is not written           |
//! | `Box<T>`                      | as `T`                                  |
//! | nested records                | not encoded here, see the mapper        |
//! | channels, function pointers   | skipped with a warning                  |
//!
//! `Option<Option<T>>` is a pointer to a pointer and is never stored.
//!
//! Applications may implement [`FieldValue`] for their own types to control
//! the stored representation.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{CodecError, CodecResult};
use crate::model::Model;
use crate::schema::{FieldKind, SchemaFn};

/// Why a field was not encoded or decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The kind has no stable textual form.
    Unsupported,
    /// A pointer to a pointer.
    PointerToPointer,
    /// A nested record, populated by association loading.
    Association,
}

/// Outcome of encoding one field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Encoded {
    /// Text to store in the hash field.
    Text(String),
    /// A `None` value; nothing is written.
    Null,
    /// A nested record, staged under its own key when association is enabled.
    Record,
    Skip(SkipReason),
}

/// Outcome of decoding one field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoded<T> {
    Value(T),
    Skip(SkipReason),
}

impl<T> Decoded<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        match self {
            Decoded::Value(v) => Decoded::Value(f(v)),
            Decoded::Skip(reason) => Decoded::Skip(reason),
        }
    }
}

/// A type that can be stored as one hash field.
pub trait FieldValue: Sized + Send + Sync + 'static {
    /// Kind category of the type.
    fn kind() -> FieldKind;

    /// Encode the value for storage.
    fn encode(&self) -> CodecResult<Encoded>;

    /// Decode stored text into a fresh value.
    fn decode(text: &str) -> CodecResult<Decoded<Self>>;

    /// Text used for this value inside an identity key.
    fn key_text(&self) -> String;

    /// The value as a nested record, if it is one and is present.
    fn as_model(&self) -> Option<&dyn Model> {
        None
    }

    /// Schema of the nested record type, for record kinds.
    fn nested_schema() -> Option<SchemaFn> {
        None
    }

    /// Store a freshly loaded nested record into this slot.
    ///
    /// Returns `false` if the slot cannot hold a record of that type.
    fn attach(&mut self, _nested: Box<dyn Model>) -> bool {
        false
    }

    /// A zero value to populate an empty slot with, when one exists.
    fn zeroed() -> Option<Self> {
        None
    }
}

/// Decode `text` and store the result in `slot`, leaving it untouched on skip.
pub fn decode_into<T: FieldValue>(slot: &mut T, text: &str) -> CodecResult<Decoded<()>> {
    Ok(T::decode(text)?.map(|value| *slot = value))
}

fn parse_error(target: &'static str, text: &str, reason: impl ToString) -> CodecError {
    CodecError::Parse {
        target,
        text: text.to_string(),
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

impl FieldValue for bool {
    fn kind() -> FieldKind {
        FieldKind::Bool
    }

    fn encode(&self) -> CodecResult<Encoded> {
        Ok(Encoded::Text(if *self { "1" } else { "0" }.to_string()))
    }

    fn decode(text: &str) -> CodecResult<Decoded<Self>> {
        // Anything but "1" or "true" reads as false, empty text included.
        Ok(Decoded::Value(matches!(text, "1" | "true")))
    }

    fn key_text(&self) -> String {
        self.to_string()
    }
}

macro_rules! impl_numeric_field {
    ($kind:ident => $($ty:ty),+ $(,)?) => {
        $(
            impl FieldValue for $ty {
                fn kind() -> FieldKind {
                    FieldKind::$kind
                }

                fn encode(&self) -> CodecResult<Encoded> {
                    Ok(Encoded::Text(self.to_string()))
                }

                fn decode(text: &str) -> CodecResult<Decoded<Self>> {
                    text.parse::<$ty>()
                        .map(Decoded::Value)
                        .map_err(|e| parse_error(stringify!($ty), text, e))
                }

                fn key_text(&self) -> String {
                    self.to_string()
                }
            }
        )+
    };
}

impl_numeric_field!(Int => i8, i16, i32, i64, i128, isize);
impl_numeric_field!(Uint => u8, u16, u32, u64, u128, usize);
// `Display` for floats prints the shortest text that parses back to the same value.
impl_numeric_field!(Float => f32, f64);

impl FieldValue for String {
    fn kind() -> FieldKind {
        FieldKind::String
    }

    fn encode(&self) -> CodecResult<Encoded> {
        Ok(Encoded::Text(self.clone()))
    }

    fn decode(text: &str) -> CodecResult<Decoded<Self>> {
        Ok(Decoded::Value(text.to_string()))
    }

    fn key_text(&self) -> String {
        self.clone()
    }
}

impl FieldValue for char {
    fn kind() -> FieldKind {
        FieldKind::String
    }

    fn encode(&self) -> CodecResult<Encoded> {
        Ok(Encoded::Text(self.to_string()))
    }

    fn decode(text: &str) -> CodecResult<Decoded<Self>> {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Decoded::Value(c)),
            _ => Err(parse_error("char", text, "expected exactly one character")),
        }
    }

    fn key_text(&self) -> String {
        self.to_string()
    }
}

// ---------------------------------------------------------------------------
// Composites (JSON)
// ---------------------------------------------------------------------------

fn encode_json<T: Serialize>(value: &T, target: &'static str) -> CodecResult<Encoded> {
    serde_json::to_string(value)
        .map(Encoded::Text)
        .map_err(|e| CodecError::Json {
            target,
            reason: e.to_string(),
        })
}

fn decode_json<T: DeserializeOwned>(text: &str, target: &'static str) -> CodecResult<Decoded<T>> {
    serde_json::from_str(text)
        .map(Decoded::Value)
        .map_err(|e| CodecError::Json {
            target,
            reason: e.to_string(),
        })
}

/// JSON text of a composite as it appears in an identity key.
///
/// Map keys come out sorted (`serde_json::Value` keeps objects ordered). For
/// unordered collections the top-level elements are sorted by their JSON text,
/// so equal sets give equal keys whatever their iteration order.
fn canonical_key_text<T: Serialize>(value: &T, target: &'static str, unordered: bool) -> String {
    let mut json = match serde_json::to_value(value) {
        Ok(json) => json,
        Err(e) => {
            warn!(kind = target, error = %e, "composite cannot be rendered into a key; segment left empty");
            return String::new();
        }
    };
    if unordered {
        if let serde_json::Value::Array(items) = &mut json {
            items.sort_by_cached_key(|item| item.to_string());
        }
    }
    json.to_string()
}

macro_rules! impl_composite_field {
    ($target:literal, $unordered:literal, [$($gen:tt)*], $ty:ty) => {
        impl<$($gen)*> FieldValue for $ty
        where
            $ty: Serialize + DeserializeOwned + Send + Sync + 'static,
        {
            fn kind() -> FieldKind {
                FieldKind::Composite
            }

            fn encode(&self) -> CodecResult<Encoded> {
                encode_json(self, $target)
            }

            fn decode(text: &str) -> CodecResult<Decoded<Self>> {
                decode_json(text, $target)
            }

            fn key_text(&self) -> String {
                canonical_key_text(self, $target, $unordered)
            }
        }
    };
}

impl_composite_field!("sequence", false, [T], Vec<T>);
impl_composite_field!("sequence", false, [T], VecDeque<T>);
impl_composite_field!("array", false, [T, const N: usize], [T; N]);
impl_composite_field!("set", true, [T: Eq + Hash], HashSet<T>);
impl_composite_field!("set", false, [T: Ord], BTreeSet<T>);
impl_composite_field!("map", false, [K: Eq + Hash, V], HashMap<K, V>);
impl_composite_field!("map", false, [K: Ord, V], BTreeMap<K, V>);

impl FieldValue for serde_json::Value {
    fn kind() -> FieldKind {
        FieldKind::Composite
    }

    fn encode(&self) -> CodecResult<Encoded> {
        encode_json(self, "json value")
    }

    fn decode(text: &str) -> CodecResult<Decoded<Self>> {
        decode_json(text, "json value")
    }

    fn key_text(&self) -> String {
        self.to_string()
    }
}

// ---------------------------------------------------------------------------
// Indirection
// ---------------------------------------------------------------------------

impl<T: FieldValue> FieldValue for Option<T> {
    fn kind() -> FieldKind {
        FieldKind::pointer(T::kind())
    }

    fn encode(&self) -> CodecResult<Encoded> {
        if T::kind().is_pointer() {
            return Ok(Encoded::Skip(SkipReason::PointerToPointer));
        }
        match self {
            Some(value) => value.encode(),
            None => Ok(Encoded::Null),
        }
    }

    fn decode(text: &str) -> CodecResult<Decoded<Self>> {
        if T::kind().is_pointer() {
            return Ok(Decoded::Skip(SkipReason::PointerToPointer));
        }
        Ok(T::decode(text)?.map(Some))
    }

    fn key_text(&self) -> String {
        match self {
            Some(value) => value.key_text(),
            None => "<nil>".to_string(),
        }
    }

    fn as_model(&self) -> Option<&dyn Model> {
        self.as_ref().and_then(FieldValue::as_model)
    }

    fn nested_schema() -> Option<SchemaFn> {
        T::nested_schema()
    }

    fn attach(&mut self, nested: Box<dyn Model>) -> bool {
        let Some(mut slot) = T::zeroed() else {
            return false;
        };
        if !slot.attach(nested) {
            return false;
        }
        *self = Some(slot);
        true
    }

    fn zeroed() -> Option<Self> {
        Some(None)
    }
}

impl<T: FieldValue> FieldValue for Box<T> {
    fn kind() -> FieldKind {
        T::kind()
    }

    fn encode(&self) -> CodecResult<Encoded> {
        (**self).encode()
    }

    fn decode(text: &str) -> CodecResult<Decoded<Self>> {
        Ok(T::decode(text)?.map(Box::new))
    }

    fn key_text(&self) -> String {
        (**self).key_text()
    }

    fn as_model(&self) -> Option<&dyn Model> {
        (**self).as_model()
    }

    fn nested_schema() -> Option<SchemaFn> {
        T::nested_schema()
    }

    fn attach(&mut self, nested: Box<dyn Model>) -> bool {
        (**self).attach(nested)
    }

    fn zeroed() -> Option<Self> {
        T::zeroed().map(Box::new)
    }
}

// ---------------------------------------------------------------------------
// Runtime-only handles
// ---------------------------------------------------------------------------

macro_rules! impl_unsupported_field {
    ($name:literal, [$($gen:tt)*], $ty:ty) => {
        impl<$($gen)*> FieldValue for $ty
        where
            $ty: Send + Sync + 'static,
        {
            fn kind() -> FieldKind {
                FieldKind::Unsupported($name)
            }

            fn encode(&self) -> CodecResult<Encoded> {
                Ok(Encoded::Skip(SkipReason::Unsupported))
            }

            fn decode(_text: &str) -> CodecResult<Decoded<Self>> {
                Ok(Decoded::Skip(SkipReason::Unsupported))
            }

            fn key_text(&self) -> String {
                concat!("<", $name, ">").to_string()
            }
        }
    };
}

impl_unsupported_field!("channel", [T], std::sync::mpsc::Sender<T>);
impl_unsupported_field!("channel", [T], std::sync::mpsc::SyncSender<T>);
impl_unsupported_field!("channel", [T], tokio::sync::mpsc::Sender<T>);
impl_unsupported_field!("channel", [T], tokio::sync::mpsc::UnboundedSender<T>);
impl_unsupported_field!("channel", [T], tokio::sync::oneshot::Sender<T>);
impl_unsupported_field!("function", [R], fn() -> R);
impl_unsupported_field!("function", [A, R], fn(A) -> R);
impl_unsupported_field!("function", [A, B, R], fn(A, B) -> R);

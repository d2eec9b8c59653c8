use std::collections::BTreeMap;
use std::fmt;

use crate::codec::{Encoded, FieldValue};
use crate::error::CodecResult;
use crate::model::Model;

/// A field value with its type erased, as held by [`FieldUpdates`].
pub trait ErasedField: Send + Sync {
    fn encode_value(&self) -> CodecResult<Encoded>;

    /// The value as a nested record, if it is one.
    fn nested(&self) -> Option<&dyn Model>;
}

impl<T: FieldValue> ErasedField for T {
    fn encode_value(&self) -> CodecResult<Encoded> {
        self.encode()
    }

    fn nested(&self) -> Option<&dyn Model> {
        self.as_model()
    }
}

/// Named field values for a multi-field update.
///
/// ```
/// use rorm::FieldUpdates;
///
/// let updates = FieldUpdates::new().set("Name", "ada".to_string()).set("Age", 36u32);
/// assert_eq!(updates.names().collect::<Vec<_>>(), ["Age", "Name"]);
/// ```
#[derive(Default)]
pub struct FieldUpdates {
    values: BTreeMap<String, Box<dyn ErasedField>>,
}

impl FieldUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<V: FieldValue>(mut self, name: impl Into<String>, value: V) -> Self {
        self.insert(name, value);
        self
    }

    /// Add or replace the value for `name`.
    pub fn insert<V: FieldValue>(&mut self, name: impl Into<String>, value: V) {
        self.values.insert(name.into(), Box::new(value));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Field names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &dyn ErasedField)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }
}

impl fmt::Debug for FieldUpdates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

//! Per-type field descriptor tables.
//!
//! Every record type owns exactly one [`RecordSchema`], built the first time
//! it is requested and cached for the life of the process. Tag strings are
//! parsed into [`FieldDirectives`] once, while the schema is built.
//!
//! Tag grammar, directives separated by `;`:
//!
//! - `primary` -- the field participates in the record's identity key
//! - `foreignKey:<Field>` -- a nested-record field populated by looking up
//!   the sibling `<Field>`'s value as the nested record's identity
//! - `-` -- the field is never written

use std::fmt;

use tracing::warn;

use crate::model::Model;

/// Kind category of a field, which selects its codec rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Int,
    Uint,
    Float,
    String,
    /// Sequence, fixed array, set or map, stored as JSON.
    Composite,
    /// A nested record, persisted under its own key.
    Record,
    /// Nullable indirection (`Option<T>`) to the inner kind.
    Pointer(Box<FieldKind>),
    /// A kind with no stable textual form, named for diagnostics.
    Unsupported(&'static str),
}

impl FieldKind {
    pub fn pointer(inner: FieldKind) -> Self {
        FieldKind::Pointer(Box::new(inner))
    }

    /// The kind after removing one level of indirection.
    pub fn pointee(&self) -> &FieldKind {
        match self {
            FieldKind::Pointer(inner) => inner,
            other => other,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, FieldKind::Pointer(_))
    }

    /// A nested record, or a pointer to one.
    pub fn is_record(&self) -> bool {
        matches!(self.pointee(), FieldKind::Record)
    }

    pub fn is_pointer_to_pointer(&self) -> bool {
        matches!(self, FieldKind::Pointer(inner) if inner.is_pointer())
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self.pointee(), FieldKind::Unsupported(_)) && !self.is_pointer_to_pointer()
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Bool => write!(f, "bool"),
            FieldKind::Int => write!(f, "int"),
            FieldKind::Uint => write!(f, "uint"),
            FieldKind::Float => write!(f, "float"),
            FieldKind::String => write!(f, "string"),
            FieldKind::Composite => write!(f, "composite"),
            FieldKind::Record => write!(f, "record"),
            FieldKind::Pointer(inner) => write!(f, "*{inner}"),
            FieldKind::Unsupported(name) => write!(f, "unsupported({name})"),
        }
    }
}

/// Parsed tag directives of one field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldDirectives {
    pub primary: bool,
    pub foreign_key: Option<String>,
    pub skip: bool,
}

impl FieldDirectives {
    /// Parse a tag string such as `"primary"` or `"foreignKey:UserID;-"`.
    ///
    /// Unknown directives are ignored with a warning.
    ///
    /// # Examples
    ///
    /// ```
    /// use rorm::FieldDirectives;
    ///
    /// let d = FieldDirectives::parse("primary; foreignKey:OwnerID");
    /// assert!(d.primary);
    /// assert_eq!(d.foreign_key.as_deref(), Some("OwnerID"));
    /// assert!(!d.skip);
    /// ```
    pub fn parse(tag: &str) -> Self {
        let mut directives = FieldDirectives::default();
        for part in tag.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            if part == "primary" {
                directives.primary = true;
            } else if part == "-" {
                directives.skip = true;
            } else if let Some(owner) = part.strip_prefix("foreignKey:") {
                let owner = owner.trim();
                if owner.is_empty() {
                    warn!(tag, "foreignKey directive without a field name; ignored");
                } else {
                    directives.foreign_key = Some(owner.to_string());
                }
            } else {
                warn!(tag, directive = part, "unknown field directive; ignored");
            }
        }
        directives
    }
}

/// Resolves the schema of a nested record type on demand.
///
/// Stored as a function so that record types may refer to each other.
pub type SchemaFn = fn() -> &'static RecordSchema;

/// Constructs a zero-valued instance of a record type.
pub type Factory = fn() -> Box<dyn Model>;

/// Descriptor of one declared field.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    pub directives: FieldDirectives,
    nested: Option<SchemaFn>,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, kind: FieldKind, tag: &str) -> Self {
        Self {
            name,
            kind,
            directives: FieldDirectives::parse(tag),
            nested: None,
        }
    }

    /// Record the schema of the nested record type this field holds.
    pub fn with_nested(mut self, nested: Option<SchemaFn>) -> Self {
        self.nested = nested;
        self
    }

    /// Schema of the nested record type, for record-kind fields.
    pub fn nested_schema(&self) -> Option<&'static RecordSchema> {
        self.nested.map(|schema| schema())
    }
}

/// Field descriptor table of a record type.
pub struct RecordSchema {
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
    factory: Factory,
}

impl RecordSchema {
    /// Build a schema, checking cross-field directives once.
    pub fn new(type_name: &'static str, fields: Vec<FieldDescriptor>, factory: Factory) -> Self {
        let schema = Self {
            type_name,
            fields,
            factory,
        };
        schema.check_directives();
        schema
    }

    fn check_directives(&self) {
        if self.primary_fields().next().is_none() {
            warn!(type_name = self.type_name, "record type declares no primary field");
        }
        for field in &self.fields {
            let Some(owner) = field.directives.foreign_key.as_deref() else {
                continue;
            };
            if !field.kind.is_record() {
                warn!(
                    type_name = self.type_name,
                    field = field.name,
                    "foreignKey directive on a field that is not a nested record"
                );
            }
            if self.field(owner).is_none() {
                warn!(
                    type_name = self.type_name,
                    field = field.name,
                    owner,
                    "foreignKey refers to an undeclared field"
                );
            }
        }
    }

    /// Fully-qualified type name, the first segment of every key of this type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Declared fields, in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Primary-tagged fields with their indices, in declaration order.
    pub fn primary_fields(&self) -> impl Iterator<Item = (usize, &FieldDescriptor)> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.directives.primary)
    }

    /// Index of the first primary-tagged field.
    pub fn first_primary(&self) -> Option<usize> {
        self.primary_fields().next().map(|(index, _)| index)
    }

    /// A fresh zero-valued instance of the record type.
    pub fn instantiate(&self) -> Box<dyn Model> {
        (self.factory)()
    }

    /// Glob pattern matching every key of this type.
    pub fn key_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.type_name.len() + 2);
        for ch in self.type_name.chars() {
            if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(ch);
        }
        pattern.push_str("/*");
        pattern
    }
}

impl fmt::Debug for RecordSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSchema")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields)
            .finish()
    }
}

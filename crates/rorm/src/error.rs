use thiserror::Error;

use rorm_store::StoreError;

/// Errors produced while converting a field value to or from its stored text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Stored text does not match the scalar grammar of the target type.
    #[error("cannot parse {text:?} as {target}: {reason}")]
    Parse {
        target: &'static str,
        text: String,
        reason: String,
    },

    /// JSON serialization or deserialization of a composite value failed.
    #[error("JSON error for {target}: {reason}")]
    Json { target: &'static str, reason: String },
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Error returned by an [`AutoLoad`](crate::AutoLoad) implementation.
pub type LoadError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from mapping and query operations.
#[derive(Debug, Error)]
pub enum OrmError {
    /// A nested record could not be attached because its field is not an
    /// indirection-capable slot for that record type.
    #[error("pointer parameter needed for field {field}")]
    PointerRequired { field: String },

    /// The model exposes no named fields and cannot be mapped.
    #[error("model must be struct type: {type_name}")]
    ModelMustBeStruct { type_name: String },

    /// A field name does not belong to the record type, or an update names a
    /// field tagged `-`.
    #[error("field not exists in struct: {0}")]
    FieldNotExist(String),

    /// The record type declares no primary field, or the record's key is
    /// absent from the store when the operation requires it to exist.
    #[error("primary key not found: {0}")]
    PrimaryKeyNotFound(String),

    /// No stored data exists for the key and no fallback produced any.
    #[error("no data found for key {0}")]
    DataNotFound(String),

    /// A collection query was issued without a key pattern.
    #[error("query pattern must not be empty")]
    EmptyPattern,

    /// Association loading revisited a key or exceeded the depth limit.
    #[error("association cycle at {key} (depth {depth})")]
    AssociationCycle { key: String, depth: usize },

    /// A stored value could not be decoded into, or a value encoded from, a field.
    #[error("field {field}: {source}")]
    Codec {
        field: String,
        #[source]
        source: CodecError,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The record's auto-load capability failed.
    #[error("auto-load failed: {0}")]
    Load(String),

    /// The background write of an auto-loaded record did not complete.
    #[error("background persistence failed: {0}")]
    Persist(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("configuration error: {0}")]
    Config(String),
}

impl OrmError {
    /// Attach the field name to a codec failure.
    pub fn codec(field: impl Into<String>, source: CodecError) -> Self {
        OrmError::Codec {
            field: field.into(),
            source,
        }
    }
}

/// Result alias for mapping and query operations.
pub type OrmResult<T> = Result<T, OrmError>;

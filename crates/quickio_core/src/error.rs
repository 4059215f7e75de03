//! Error types for QuickIO core.

use quickio_codec::{CodecError, Value};
use quickio_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in QuickIO core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage engine error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The database name cannot be used as a directory name.
    #[error("invalid database name '{name}': {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// An indexed value is already owned by another record.
    #[error("index {triple} already exists")]
    UniqueViolation {
        /// The colliding index triple, `[Type,field,value]`.
        triple: String,
    },

    /// An index lookup named a field that is not indexed.
    #[error("field '{field}' of {type_name} is not indexed")]
    NonIndexedField {
        /// Record type.
        type_name: &'static str,
        /// Requested field.
        field: String,
    },

    /// A field name is not part of the record's schema.
    #[error("field '{field}' does not exist on {type_name}")]
    FieldNotFound {
        /// Record type.
        type_name: &'static str,
        /// Requested field.
        field: String,
    },

    /// Sorting or aggregation was requested on a non-numeric field.
    #[error("field '{field}' of {type_name} is not numeric")]
    FieldNotNumeric {
        /// Record type.
        type_name: &'static str,
        /// Requested field.
        field: String,
    },

    /// Any other schema misuse.
    #[error("schema error: {message}")]
    Schema {
        /// Description of the problem.
        message: String,
    },

    /// Sort direction other than `1` or `-1`.
    #[error("invalid sort order {0}, expected 1 or -1")]
    InvalidSortOrder(i32),

    /// The system clock went backwards while generating ids.
    #[error("clock moved backwards: last id at {last_ms} ms, now {now_ms} ms")]
    ClockMovedBackwards {
        /// Milliseconds of the last generated id.
        last_ms: u64,
        /// Current clock reading.
        now_ms: u64,
    },

    /// Datacenter or worker id outside the 5-bit range.
    #[error("invalid generator id {datacenter_id}/{worker_id}, both must be below 32")]
    InvalidWorkerId {
        /// Requested datacenter id.
        datacenter_id: u8,
        /// Requested worker id.
        worker_id: u8,
    },

    /// The stores are still shared by live collections.
    #[error("database '{name}' is still in use by open collections")]
    InUse {
        /// Database name.
        name: String,
    },
}

impl CoreError {
    /// Creates an invalid name error.
    pub fn invalid_name(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason,
        }
    }

    /// Creates a uniqueness violation for `triple`.
    pub fn unique_violation(triple: impl Into<String>) -> Self {
        Self::UniqueViolation {
            triple: triple.into(),
        }
    }

    /// Creates a non-indexed field error.
    pub fn non_indexed(type_name: &'static str, field: impl Into<String>) -> Self {
        Self::NonIndexedField {
            type_name,
            field: field.into(),
        }
    }

    /// Creates a missing field error.
    pub fn field_not_found(type_name: &'static str, field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            type_name,
            field: field.into(),
        }
    }

    /// Creates a non-numeric field error.
    pub fn not_numeric(type_name: &'static str, field: impl Into<String>) -> Self {
        Self::FieldNotNumeric {
            type_name,
            field: field.into(),
        }
    }

    /// Creates a generic schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Creates the error for a value that does not fit a field.
    pub fn field_type(type_name: &str, field: &str, value: &Value) -> Self {
        Self::schema(format!(
            "value {value:?} does not fit field '{field}' of {type_name}"
        ))
    }

    /// Returns true for errors raised before any write was attempted
    /// because the request itself was invalid.
    #[must_use]
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::NonIndexedField { .. }
                | Self::FieldNotFound { .. }
                | Self::FieldNotNumeric { .. }
                | Self::Schema { .. }
                | Self::InvalidSortOrder(_)
        )
    }
}

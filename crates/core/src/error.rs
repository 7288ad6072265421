//! Error types for relkv
//!
//! Two layers of errors live here:
//!
//! - [`StoreError`]: failures reported by the backing store or lock adapters.
//!   These never cross a public operation boundary.
//! - [`Error`]: the caller-facing taxonomy. Every public operation maps its
//!   internal failures into one of these variants before returning.
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use thiserror::Error;

/// Result type alias for caller-facing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for adapter-level operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures raised by a backing store or lock adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Connection, protocol or transport failure
    #[error("connection error: {0}")]
    Connection(String),

    /// Command issued against a key holding the wrong kind of value
    #[error("wrong type for key '{key}': expected {expected}")]
    WrongType {
        /// Key the command targeted
        key: String,
        /// Kind the command expected ("hash" or "list")
        expected: &'static str,
    },

    /// A batch was rejected as a whole
    #[error("batch aborted: {0}")]
    BatchAborted(String),

    /// A reply did not have the shape the caller asked for
    #[error("invalid reply: expected {expected}, got {actual}")]
    InvalidReply {
        /// Expected reply shape
        expected: &'static str,
        /// Actual reply shape
        actual: String,
    },

    /// Lock adapter failure
    #[error("lock error on '{resource}': {reason}")]
    Lock {
        /// Locked resource name
        resource: String,
        /// Failure description
        reason: String,
    },

    /// Stored payload could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Caller-facing error taxonomy.
///
/// | Code | Meaning |
/// |------|---------|
/// | `CollectionFieldInexistent` | A primary, index-pointed or foreign id is absent |
/// | `CollectionOrFieldInexistent` | The collection's reserved counter field is unreadable |
/// | `CollectionAdditionFailure` | The add batch failed wholly |
/// | `CollectionUpdateFailure` | The update batch or the update transform failed |
/// | `CollectionUpdateFailure:MismatchingForeignKeys` | Declared foreign keys differ from stored ones |
/// | `CollectionDeletionFailure` | The delete batch failed wholly |
/// | `QueueItemNotFound` | No queued entry matched the value to remove |
/// | `GenericRedisFailure` | Unclassified backing store failure |
///
/// None of these are retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Requested id (primary, via index, or foreign) does not exist
    #[error("no field '{id}' in collection '{collection}'")]
    CollectionFieldInexistent {
        /// Collection that was searched
        collection: String,
        /// Missing id (or index value, for index lookups)
        id: String,
    },

    /// Collection-level state could not be located or read
    #[error("collection '{collection}' or its field '{field}' is missing")]
    CollectionOrFieldInexistent {
        /// Collection name
        collection: String,
        /// Field name
        field: String,
    },

    /// The add batch failed
    #[error("failed to add to collection '{collection}': {reason}")]
    CollectionAdditionFailure {
        /// Collection name
        collection: String,
        /// Failure description
        reason: String,
    },

    /// The update batch or the update transform failed
    #[error("failed to update '{id}' in collection '{collection}': {reason}")]
    CollectionUpdateFailure {
        /// Collection name
        collection: String,
        /// Record id
        id: String,
        /// Failure description
        reason: String,
    },

    /// Caller-declared foreign keys differ from the stored declaration
    #[error("foreign keys of '{id}' in collection '{collection}' do not match the stored declaration")]
    MismatchingForeignKeys {
        /// Collection name
        collection: String,
        /// Record id
        id: String,
    },

    /// The delete batch failed
    #[error("failed to delete from collection '{collection}': {reason}")]
    CollectionDeletionFailure {
        /// Collection name
        collection: String,
        /// Failure description
        reason: String,
    },

    /// Queue removal target not present
    #[error("item not found in queue '{queue}'")]
    QueueItemNotFound {
        /// Queue name
        queue: String,
    },

    /// Unclassified backing store failure
    #[error("store failure: {0}")]
    GenericStoreFailure(String),

    /// Configuration rejected on load or build
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Stable taxonomy code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Error::CollectionFieldInexistent { .. } => "CollectionFieldInexistent",
            Error::CollectionOrFieldInexistent { .. } => "CollectionOrFieldInexistent",
            Error::CollectionAdditionFailure { .. } => "CollectionAdditionFailure",
            Error::CollectionUpdateFailure { .. } => "CollectionUpdateFailure",
            Error::MismatchingForeignKeys { .. } => "CollectionUpdateFailure:MismatchingForeignKeys",
            Error::CollectionDeletionFailure { .. } => "CollectionDeletionFailure",
            Error::QueueItemNotFound { .. } => "QueueItemNotFound",
            Error::GenericStoreFailure(_) => "GenericRedisFailure",
            Error::InvalidConfig(_) => "InvalidConfig",
        }
    }

    /// Shorthand for a missing id
    pub fn field_inexistent(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Error::CollectionFieldInexistent {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// True for the not-found variants
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::CollectionFieldInexistent { .. }
                | Error::CollectionOrFieldInexistent { .. }
                | Error::QueueItemNotFound { .. }
        )
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::GenericStoreFailure(e.to_string())
    }
}

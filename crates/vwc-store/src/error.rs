use vwc_types::{ObjectId, RepoPath};

/// Errors from object and backing store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// Stored content no longer hashes to its id.
    #[error("hash mismatch for {id}: computed {computed}")]
    HashMismatch { id: ObjectId, computed: ObjectId },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The object exists but has the wrong kind or shape.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    /// Attempted to write an object whose id is null.
    #[error("cannot store object with null ID")]
    NullObjectId,

    /// A delta references paths inconsistently.
    #[error("invalid delta at {path}: {reason}")]
    InvalidDelta { path: RepoPath, reason: String },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

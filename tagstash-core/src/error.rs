//! Error types for tagstash operations

use thiserror::Error;

/// Storage adapter errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("I/O failure on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Directory operation failed on {path}: {reason}")]
    Directory { path: String, reason: String },
}

impl StorageError {
    /// Returns true if this error means the file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Serialization codec errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Encoding failed: {reason}")]
    Encode { reason: String },

    #[error("Decoding failed: {reason}")]
    Decode { reason: String },
}

/// Top-level error for cache pool operations.
///
/// `InvalidArgument` always propagates to the caller. Storage and codec
/// failures only surface on paths that do not degrade gracefully: the item
/// read path turns them into a cache miss, and boolean pool operations turn
/// them into a logged `false` return.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl CacheError {
    /// Shorthand constructor for `InvalidArgument`.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }
}

/// Result type alias for tagstash operations.
pub type CacheResult<T> = Result<T, CacheError>;

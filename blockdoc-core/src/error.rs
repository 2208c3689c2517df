//! Error types for document operations.

use thiserror::Error;

use crate::BlockId;

/// Result type for document operations.
pub type EditorResult<T> = Result<T, EditorError>;

/// Errors that can occur in document operations.
///
/// Nothing here is fatal to the host: every variant is recoverable at the
/// operation boundary and leaves the live document untouched.
#[derive(Debug, Error)]
pub enum EditorError {
    /// Image payload exceeds the ingestion ceiling.
    #[error("Image is {size} bytes, limit is {limit} bytes")]
    FileTooLarge {
        /// Size of the rejected payload in bytes.
        size: usize,
        /// Configured ceiling in bytes.
        limit: usize,
    },

    /// Block not found in the item store.
    #[error("Block not found: {0}")]
    BlockNotFound(BlockId),

    /// No snapshot is stored under the key.
    #[error("No saved document under key: {0}")]
    SnapshotNotFound(String),

    /// Stored payload does not parse or validate.
    #[error("Saved document is corrupt: {0}")]
    Corrupt(String),

    /// A push addressed a display surface that is not mounted.
    #[error("No display surface for block: {0}")]
    MissingTarget(BlockId),

    /// Colour value is not a recognised hex or rgb() string.
    #[error("Invalid colour: {0}")]
    InvalidColor(String),

    /// Invalid layout or block operation.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Storage backend rejected a read or write.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot encoding failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

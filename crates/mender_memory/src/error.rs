//! Error types for the memory subsystem.

use thiserror::Error;

/// Result type alias for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Errors raised by the record store or embedding layer.
///
/// These never cross the bridge boundary: the bridge converts them into
/// empty results.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

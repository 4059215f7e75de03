//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The underlying sled engine reported an error.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// An engine rejected an operation for a reason of its own.
    #[error("engine error: {0}")]
    Engine(String),

    /// The store has already been closed.
    #[error("store is closed")]
    Closed,

    /// The on-disk state is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}

impl StorageError {
    /// Creates an engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine(message.into())
    }
}

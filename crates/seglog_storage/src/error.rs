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

    /// The path is not a valid store-relative path.
    #[error("invalid store path: {0:?}")]
    InvalidPath(String),

    /// Another process holds the store directory.
    #[error("store locked: another process has exclusive access")]
    Locked,
}

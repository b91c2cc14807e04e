//! Error types for seglog core.

use crate::types::LogId;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in seglog core operations.
///
/// A full segment is not an error: capacity refusal drives rollover to a
/// new segment and is never surfaced to callers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error (write, read, exists, or remove failed).
    #[error("storage error: {0}")]
    Storage(#[from] seglog_storage::StorageError),

    /// I/O error outside the store, e.g. spawning the flush thread.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The segment is not loaded but the operation needs its records.
    #[error("segment {segment} is not loaded")]
    Unavailable {
        /// The segment that was unloaded.
        segment: LogId,
    },

    /// The segment is already resident in memory.
    #[error("segment {segment} is already loaded")]
    AlreadyLoaded {
        /// The segment that was loaded.
        segment: LogId,
    },

    /// No backing file exists for the segment or metadata.
    #[error("no file at {path}")]
    NotFound {
        /// Store path that was looked up.
        path: String,
    },

    /// A persisted file could not be decoded.
    #[error("corrupt file at {path}: {message}")]
    Corrupt {
        /// Store path of the corrupt file.
        path: String,
        /// Description of the corruption.
        message: String,
    },

    /// In-memory state could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// The log has been closed.
    #[error("log is closed")]
    LogClosed,

    /// The log closed before a pending flush could be made durable.
    #[error("flush abandoned: {message}")]
    FlushAbandoned {
        /// The last flush failure, or why the wait ended.
        message: String,
    },
}

impl CoreError {
    /// Creates an unavailable-segment error.
    pub fn unavailable(segment: LogId) -> Self {
        Self::Unavailable { segment }
    }

    /// Creates an already-loaded error.
    pub fn already_loaded(segment: LogId) -> Self {
        Self::AlreadyLoaded { segment }
    }

    /// Creates a not-found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a corruption error.
    pub fn corrupt(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a flush-abandoned error.
    pub fn flush_abandoned(message: impl Into<String>) -> Self {
        Self::FlushAbandoned {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_segment_id() {
        let err = CoreError::unavailable(LogId::new(7));
        assert_eq!(err.to_string(), "segment id:7 is not loaded");
    }

    #[test]
    fn storage_errors_convert() {
        let storage = seglog_storage::StorageError::InvalidPath("..".into());
        let err: CoreError = storage.into();
        assert!(matches!(err, CoreError::Storage(_)));
    }
}

//! File store trait definition.

use crate::error::StorageResult;

/// A path-addressed file store for seglog.
///
/// Stores are **opaque**: they map store-relative paths (`/`-separated,
/// e.g. `"orders/segment_42"`) to whole-file byte contents. seglog owns
/// the interpretation of those bytes.
///
/// # Invariants
///
/// - `replace` is atomic: after a crash a reader observes either the
///   previous contents or the new contents, never a mix
/// - `load_and_repair` returns exactly the bytes of the last successful
///   `replace`, or `None` if the path was never written or was removed
/// - `remove` of a missing path is an error-free no-op
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::DirStore`] - For persistent storage
pub trait FileStore: Send + Sync {
    /// Atomically overwrites (or creates) the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or an I/O error occurs.
    /// On error the previous contents are left in place.
    fn replace(&self, path: &str, data: &[u8]) -> StorageResult<()>;

    /// Reads the file at `path`, cleaning up after an interrupted
    /// `replace` first.
    ///
    /// Returns `None` if no file exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or an I/O error occurs.
    fn load_and_repair(&self, path: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Returns whether a file exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or the check fails.
    fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Removes the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or the removal fails.
    fn remove(&self, path: &str) -> StorageResult<()>;
}

impl<T: FileStore + ?Sized> FileStore for std::sync::Arc<T> {
    fn replace(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        (**self).replace(path, data)
    }

    fn load_and_repair(&self, path: &str) -> StorageResult<Option<Vec<u8>>> {
        (**self).load_and_repair(path)
    }

    fn exists(&self, path: &str) -> StorageResult<bool> {
        (**self).exists(path)
    }

    fn remove(&self, path: &str) -> StorageResult<()> {
        (**self).remove(path)
    }
}

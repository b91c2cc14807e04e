//! In-memory file store for testing.

use crate::backend::FileStore;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// An in-memory file store.
///
/// This store keeps every file in a map and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral logs that don't need persistence
///
/// Replacement is trivially atomic: the map entry is swapped under a lock.
///
/// # Example
///
/// ```rust
/// use seglog_storage::{FileStore, InMemoryStore};
///
/// let store = InMemoryStore::new();
/// store.replace("a/b", b"data").unwrap();
/// assert!(store.exists("a/b").unwrap());
/// assert_eq!(store.write_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
    writes: AtomicU64,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every file in the store, ordered by path.
    ///
    /// Useful for comparing the persisted state of two logs.
    #[must_use]
    pub fn files(&self) -> BTreeMap<String, Vec<u8>> {
        self.files.read().clone()
    }

    /// Returns a copy of one file, if present.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.read().get(path).cloned()
    }

    /// Returns how many successful `replace` calls this store has served.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Acquire)
    }
}

fn check_path(path: &str) -> StorageResult<()> {
    if path.is_empty() || path.ends_with('/') {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(())
}

impl FileStore for InMemoryStore {
    fn replace(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        check_path(path)?;
        self.files.write().insert(path.to_string(), data.to_vec());
        self.writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn load_and_repair(&self, path: &str) -> StorageResult<Option<Vec<u8>>> {
        check_path(path)?;
        Ok(self.files.read().get(path).cloned())
    }

    fn exists(&self, path: &str) -> StorageResult<bool> {
        check_path(path)?;
        Ok(self.files.read().contains_key(path))
    }

    fn remove(&self, path: &str) -> StorageResult<()> {
        check_path(path)?;
        self.files.write().remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.files().is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn memory_replace_and_load() {
        let store = InMemoryStore::new();
        store.replace("q/segment_1", b"first").unwrap();
        store.replace("q/segment_1", b"second").unwrap();

        let data = store.load_and_repair("q/segment_1").unwrap();
        assert_eq!(data.as_deref(), Some(&b"second"[..]));
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn memory_load_missing_is_none() {
        let store = InMemoryStore::new();
        assert!(store.load_and_repair("nothing").unwrap().is_none());
        assert!(!store.exists("nothing").unwrap());
    }

    #[test]
    fn memory_remove_is_idempotent() {
        let store = InMemoryStore::new();
        store.replace("x", b"1").unwrap();
        store.remove("x").unwrap();
        store.remove("x").unwrap();
        assert!(!store.exists("x").unwrap());
    }

    #[test]
    fn memory_rejects_directory_paths() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.replace("dir/", b""),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            store.exists(""),
            Err(StorageError::InvalidPath(_))
        ));
    }
}

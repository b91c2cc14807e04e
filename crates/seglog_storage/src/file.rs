//! Directory-backed file store for persistent storage.

use crate::backend::FileStore;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

/// Advisory lock file held for the lifetime of a [`DirStore`].
const LOCK_FILE: &str = ".seglog.lock";
/// Suffix of the scratch file written before the rename in `replace`.
const TEMP_SUFFIX: &str = ".tmp";

/// A file store rooted at a directory.
///
/// Store paths are `/`-separated and relative to the root. Parent
/// directories are created on demand.
///
/// # Durability
///
/// `replace` uses the write-then-rename pattern:
/// 1. Write the new contents to `<file>.tmp`
/// 2. `sync_all` the temporary file
/// 3. Rename it over `<file>`
/// 4. Fsync the parent directory so the rename itself is durable
///
/// A crash between steps 1 and 3 leaves a stale `<file>.tmp` behind;
/// `load_and_repair` deletes it and serves the last complete version.
///
/// Concurrent `replace` calls for the *same* path must be serialized by
/// the caller; different paths may be replaced concurrently.
///
/// # Locking
///
/// The root directory is held under an exclusive advisory lock, so only
/// one process can write to it at a time.
///
/// # Example
///
/// ```no_run
/// use seglog_storage::{DirStore, FileStore};
/// use std::path::Path;
///
/// let store = DirStore::open(Path::new("queue-data")).unwrap();
/// store.replace("orders/segment_1", b"[]").unwrap();
/// ```
#[derive(Debug)]
pub struct DirStore {
    root: PathBuf,
    _lock_file: File,
}

impl DirStore {
    /// Opens (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created or is not a directory
    /// - Another process holds the lock (returns [`StorageError::Locked`])
    pub fn open(root: &Path) -> StorageResult<Self> {
        if !root.exists() {
            fs::create_dir_all(root)?;
        }

        if !root.is_dir() {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("store root is not a directory: {}", root.display()),
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(root.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        Ok(Self {
            root: root.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a store path onto the filesystem, rejecting anything that
    /// could escape the root.
    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        if path.is_empty() || path.ends_with('/') {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        let relative = Path::new(path);
        let all_normal = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !all_normal || path == LOCK_FILE {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        Ok(self.root.join(relative))
    }

    fn temp_path(target: &Path) -> PathBuf {
        let mut name = target.as_os_str().to_owned();
        name.push(TEMP_SUFFIX);
        PathBuf::from(name)
    }
}

impl FileStore for DirStore {
    fn replace(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let target = self.resolve(path)?;
        let parent = target.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&parent)?;

        let temp = Self::temp_path(&target);
        let mut file = File::create(&temp)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp, &target)?;
        sync_directory(&parent)?;

        Ok(())
    }

    fn load_and_repair(&self, path: &str) -> StorageResult<Option<Vec<u8>>> {
        let target = self.resolve(path)?;

        let temp = Self::temp_path(&target);
        if temp.exists() {
            fs::remove_file(&temp)?;
        }

        match fs::read(&target) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, path: &str) -> StorageResult<bool> {
        let target = self.resolve(path)?;
        Ok(target.is_file())
    }

    fn remove(&self, path: &str) -> StorageResult<()> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target) {
            Ok(()) => {
                if let Some(parent) = target.parent() {
                    sync_directory(parent)?;
                }
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Fsyncs a directory so that renames and deletions inside it are durable.
///
/// Windows NTFS journals metadata updates and does not support opening a
/// directory for sync, so this is a no-op there.
#[cfg(unix)]
fn sync_directory(dir: &Path) -> StorageResult<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> StorageResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn dir_open_creates_root() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("store");

        let store = DirStore::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root);
    }

    #[test]
    fn dir_replace_and_load() {
        let temp = tempdir().unwrap();
        let store = DirStore::open(temp.path()).unwrap();

        store.replace("q/segment_7", b"one").unwrap();
        store.replace("q/segment_7", b"two").unwrap();

        let data = store.load_and_repair("q/segment_7").unwrap();
        assert_eq!(data.as_deref(), Some(&b"two"[..]));
        assert!(temp.path().join("q").join("segment_7").is_file());
    }

    #[test]
    fn dir_persists_across_reopen() {
        let temp = tempdir().unwrap();

        {
            let store = DirStore::open(temp.path()).unwrap();
            store.replace("meta", b"persistent").unwrap();
        }

        let store = DirStore::open(temp.path()).unwrap();
        let data = store.load_and_repair("meta").unwrap();
        assert_eq!(data.as_deref(), Some(&b"persistent"[..]));
    }

    #[test]
    fn dir_load_missing_is_none() {
        let temp = tempdir().unwrap();
        let store = DirStore::open(temp.path()).unwrap();
        assert!(store.load_and_repair("absent").unwrap().is_none());
        assert!(!store.exists("absent").unwrap());
    }

    #[test]
    fn dir_repair_discards_interrupted_replace() {
        let temp = tempdir().unwrap();
        let store = DirStore::open(temp.path()).unwrap();
        store.replace("seg", b"complete").unwrap();

        // Simulate a crash after the scratch write but before the rename.
        fs::write(temp.path().join("seg.tmp"), b"half-writ").unwrap();

        let data = store.load_and_repair("seg").unwrap();
        assert_eq!(data.as_deref(), Some(&b"complete"[..]));
        assert!(!temp.path().join("seg.tmp").exists());
    }

    #[test]
    fn dir_remove_is_idempotent() {
        let temp = tempdir().unwrap();
        let store = DirStore::open(temp.path()).unwrap();

        store.replace("gone", b"x").unwrap();
        store.remove("gone").unwrap();
        store.remove("gone").unwrap();
        assert!(!store.exists("gone").unwrap());
    }

    #[test]
    fn dir_rejects_escaping_paths() {
        let temp = tempdir().unwrap();
        let store = DirStore::open(temp.path()).unwrap();

        for bad in ["../outside", "/abs", "a/../b", "", "dir/", LOCK_FILE] {
            assert!(
                matches!(store.replace(bad, b"x"), Err(StorageError::InvalidPath(_))),
                "path {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn dir_lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let _first = DirStore::open(temp.path()).unwrap();

        let second = DirStore::open(temp.path());
        assert!(matches!(second, Err(StorageError::Locked)));
    }

    #[test]
    fn dir_lock_released_on_drop() {
        let temp = tempdir().unwrap();
        {
            let _store = DirStore::open(temp.path()).unwrap();
        }
        let _again = DirStore::open(temp.path()).unwrap();
    }
}

//! Fault injection for flush and load paths.
//!
//! [`FlakyStore`] wraps any [`FileStore`] and fails a chosen number of
//! upcoming calls, so tests can drive the log through a failed flush cycle
//! and check what the next cycle recovers. [`GatedStore`] parks writes to
//! one path until the test lets them through, so a test can act while a
//! flush cycle is stuck mid-write.
//!
//! ## Usage
//!
//! ```rust
//! use seglog_storage::{FileStore, InMemoryStore};
//! use seglog_testkit::FlakyStore;
//!
//! let store = FlakyStore::new(InMemoryStore::new());
//! store.fail_next_replaces(1);
//! assert!(store.replace("a", b"1").is_err());
//! assert!(store.replace("a", b"1").is_ok());
//! assert_eq!(store.injected_failures(), 1);
//! ```

use parking_lot::{Condvar, Mutex};
use seglog_storage::{FileStore, StorageError, StorageResult};
use std::io;
use std::time::Duration;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A store wrapper that fails on demand.
#[derive(Debug)]
pub struct FlakyStore<S> {
    inner: S,
    failing_replaces: AtomicUsize,
    failing_loads: AtomicUsize,
    injected: AtomicUsize,
}

impl<S: FileStore> FlakyStore<S> {
    /// Wraps `inner` with no faults armed.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing_replaces: AtomicUsize::new(0),
            failing_loads: AtomicUsize::new(0),
            injected: AtomicUsize::new(0),
        }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Makes the next `n` calls to `replace` fail.
    pub fn fail_next_replaces(&self, n: usize) {
        self.failing_replaces.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` calls to `load_and_repair` fail.
    pub fn fail_next_loads(&self, n: usize) {
        self.failing_loads.store(n, Ordering::SeqCst);
    }

    /// Disarms all pending faults.
    pub fn heal(&self) {
        self.failing_replaces.store(0, Ordering::SeqCst);
        self.failing_loads.store(0, Ordering::SeqCst);
    }

    /// Returns how many calls have been failed so far.
    pub fn injected_failures(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    fn trip(&self, counter: &AtomicUsize, op: &str, path: &str) -> StorageResult<()> {
        let armed = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if armed {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::Io(io::Error::other(format!(
                "injected {op} failure at {path}"
            ))));
        }
        Ok(())
    }
}

impl<S: FileStore> FileStore for FlakyStore<S> {
    fn replace(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        self.trip(&self.failing_replaces, "replace", path)?;
        self.inner.replace(path, data)
    }

    fn load_and_repair(&self, path: &str) -> StorageResult<Option<Vec<u8>>> {
        self.trip(&self.failing_loads, "load", path)?;
        self.inner.load_and_repair(path)
    }

    fn exists(&self, path: &str) -> StorageResult<bool> {
        self.inner.exists(path)
    }

    fn remove(&self, path: &str) -> StorageResult<()> {
        self.inner.remove(path)
    }
}

/// A store wrapper that holds writes to a chosen path until released.
#[derive(Debug)]
pub struct GatedStore<S> {
    inner: S,
    gate: Mutex<Gate>,
    changed: Condvar,
}

#[derive(Debug, Default)]
struct Gate {
    path: Option<String>,
    parked: usize,
}

impl<S: FileStore> GatedStore<S> {
    /// Wraps `inner` with the gate open.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            gate: Mutex::new(Gate::default()),
            changed: Condvar::new(),
        }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Holds every following `replace` of `path` until [`release`].
    ///
    /// [`release`]: GatedStore::release
    pub fn hold(&self, path: impl Into<String>) {
        self.gate.lock().path = Some(path.into());
    }

    /// Waits up to `timeout` for a writer to park at the gate. Returns
    /// whether one did.
    pub fn wait_for_parked(&self, timeout: Duration) -> bool {
        let mut gate = self.gate.lock();
        if gate.parked == 0 {
            self.changed
                .wait_while_for(&mut gate, |gate| gate.parked == 0, timeout);
        }
        gate.parked > 0
    }

    /// Opens the gate and lets parked writers finish.
    pub fn release(&self) {
        self.gate.lock().path = None;
        self.changed.notify_all();
    }
}

impl<S: FileStore> FileStore for GatedStore<S> {
    fn replace(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        {
            let mut gate = self.gate.lock();
            if gate.path.as_deref() == Some(path) {
                gate.parked += 1;
                self.changed.notify_all();
                self.changed
                    .wait_while(&mut gate, |gate| gate.path.as_deref() == Some(path));
                gate.parked -= 1;
            }
        }
        self.inner.replace(path, data)
    }

    fn load_and_repair(&self, path: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.load_and_repair(path)
    }

    fn exists(&self, path: &str) -> StorageResult<bool> {
        self.inner.exists(path)
    }

    fn remove(&self, path: &str) -> StorageResult<()> {
        self.inner.remove(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seglog_storage::InMemoryStore;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn failed_replace_leaves_target_untouched() {
        let store = FlakyStore::new(InMemoryStore::new());
        store.replace("f", b"old").unwrap();

        store.fail_next_replaces(2);
        assert!(store.replace("f", b"new").is_err());
        assert!(store.replace("f", b"new").is_err());
        assert_eq!(store.inner().get("f"), Some(b"old".to_vec()));

        store.replace("f", b"new").unwrap();
        assert_eq!(store.inner().get("f"), Some(b"new".to_vec()));
        assert_eq!(store.injected_failures(), 2);
    }

    #[test]
    fn load_faults_are_independent() {
        let store = FlakyStore::new(InMemoryStore::new());
        store.replace("f", b"x").unwrap();
        store.fail_next_loads(1);

        assert!(store.load_and_repair("f").is_err());
        assert_eq!(store.load_and_repair("f").unwrap(), Some(b"x".to_vec()));
    }

    #[test]
    fn heal_disarms() {
        let store = FlakyStore::new(InMemoryStore::new());
        store.fail_next_replaces(5);
        store.heal();
        assert!(store.replace("f", b"x").is_ok());
        assert_eq!(store.injected_failures(), 0);
    }

    #[test]
    fn gate_holds_only_its_path() {
        let store = Arc::new(GatedStore::new(InMemoryStore::new()));
        store.hold("held");
        store.replace("other", b"x").unwrap();

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || store.replace("held", b"y"))
        };
        assert!(store.wait_for_parked(Duration::from_secs(5)));
        assert_eq!(store.inner().get("held"), None);

        store.release();
        writer.join().unwrap().unwrap();
        assert_eq!(store.inner().get("held"), Some(b"y".to_vec()));
    }

    #[test]
    fn open_gate_parks_nobody() {
        let store = GatedStore::new(InMemoryStore::new());
        store.replace("f", b"x").unwrap();
        assert!(!store.wait_for_parked(Duration::from_millis(10)));
    }
}

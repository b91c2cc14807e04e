//! Log fixtures.
//!
//! Provides logs wired to deterministic ids and a manual clock, so that two
//! runs of the same appends produce byte-identical files, plus on-disk logs
//! in temporary directories.

use seglog_core::{
    IdSource, Log, LogConfig, LogId, ManualClock, Record, SequentialIds,
};
use seglog_storage::{DirStore, FileStore, InMemoryStore};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// The instant every [`ManualClock`] fixture starts at.
pub fn fixed_epoch() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

/// An in-memory log with deterministic ids and time.
pub struct TestLog {
    /// The log instance.
    pub log: Log,
    /// The store behind the log, for inspecting written files.
    pub store: Arc<InMemoryStore>,
    /// The clock the log reads; advance it to age segments.
    pub clock: Arc<ManualClock>,
}

impl TestLog {
    /// Opens a fresh in-memory log. Ids count up from 1.
    pub fn memory(config: LogConfig) -> Self {
        Self::on_store(Arc::new(InMemoryStore::new()), config)
    }

    /// Opens a log over a caller-held in-memory store. The store must be
    /// empty, since ids restart at 1.
    pub fn on_store(store: Arc<InMemoryStore>, config: LogConfig) -> Self {
        let clock = Arc::new(ManualClock::at(fixed_epoch()));
        let log = open_deterministic(store.clone(), config, clock.clone())
            .expect("Failed to open in-memory log");
        Self { log, store, clock }
    }
}

impl std::ops::Deref for TestLog {
    type Target = Log;

    fn deref(&self) -> &Self::Target {
        &self.log
    }
}

/// Opens a log over `store` with ids counting up from 1 and the given clock.
pub fn open_deterministic(
    store: Arc<dyn FileStore>,
    config: LogConfig,
    clock: Arc<ManualClock>,
) -> seglog_core::CoreResult<Log> {
    let ids: Arc<dyn IdSource> = Arc::new(SequentialIds::new());
    Log::open_with(store, config, ids, clock)
}

/// A temporary directory holding an on-disk log.
pub struct TempLogDir {
    dir: TempDir,
}

impl TempLogDir {
    /// Creates an empty temporary directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Opens (or reopens) the log in this directory.
    ///
    /// Only one log may hold the directory at a time; drop the previous
    /// one before reopening.
    pub fn open(&self, config: LogConfig) -> Log {
        let store = DirStore::open(self.dir.path()).expect("Failed to open dir store");
        Log::open(Arc::new(store), config).expect("Failed to open on-disk log")
    }
}

impl Default for TempLogDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with a log in a fresh temporary directory.
///
/// # Example
///
/// ```rust
/// use seglog_core::LogConfig;
/// use seglog_testkit::with_temp_log;
///
/// with_temp_log(LogConfig::new(), |log| {
///     log.append(b"on disk").unwrap();
/// });
/// ```
pub fn with_temp_log<F, R>(config: LogConfig, f: F) -> R
where
    F: FnOnce(&Log) -> R,
{
    let dir = TempLogDir::new();
    let log = dir.open(config);
    let result = f(&log);
    log.close().expect("Failed to close log");
    result
}

/// Reads every record in the log, oldest first.
pub fn read_all(log: &Log) -> Vec<Record> {
    let (records, _) = log
        .get(LogId::MIN, true, usize::MAX)
        .expect("Failed to read log");
    records
}

/// Appends each payload and returns the assigned ids.
pub fn append_all<P: AsRef<[u8]>>(log: &Log, payloads: &[P]) -> Vec<LogId> {
    payloads
        .iter()
        .map(|p| log.append(p.as_ref()).expect("Failed to append"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use seglog_core::Durability;

    #[test]
    fn test_memory_log_is_deterministic() {
        let a = TestLog::memory(LogConfig::new().durability(Durability::Immediate));
        let b = TestLog::memory(LogConfig::new().durability(Durability::Immediate));

        append_all(&a, &[b"x", b"y"]);
        append_all(&b, &[b"x", b"y"]);

        assert_eq!(a.store.files(), b.store.files());
    }

    #[test]
    fn test_with_temp_log() {
        let count = with_temp_log(LogConfig::new(), |log| {
            append_all(log, &[b"1", b"2", b"3"]);
            read_all(log).len()
        });
        assert_eq!(count, 3);
    }

    #[test]
    fn test_temp_dir_reopens() {
        let dir = TempLogDir::new();
        {
            let log = dir.open(LogConfig::new());
            log.append(b"kept").unwrap();
        }
        let log = dir.open(LogConfig::new());
        assert_eq!(read_all(&log)[0].payload, b"kept");
    }
}

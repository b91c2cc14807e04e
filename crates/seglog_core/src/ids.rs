//! Identifier sources.
//!
//! Every segment and every record is stamped with an id from a single
//! [`IdSource`]. The log relies on that source for its global order, so an
//! implementation must serialize issuance internally: no two calls may
//! return the same value, and a call that starts after another returned
//! must get a larger value.

use crate::types::LogId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of strictly increasing identifiers.
pub trait IdSource: Send + Sync {
    /// Issues the next identifier.
    fn next(&self) -> LogId;
}

/// Time-correlated, strictly increasing ids.
///
/// Each id is `max(previous + 1, nanoseconds since the Unix epoch)`, so ids
/// roughly track wall-clock time but never repeat or go backwards even if
/// the system clock does.
#[derive(Debug, Default)]
pub struct MonotonicIds {
    last: Mutex<i64>,
}

impl MonotonicIds {
    /// Creates a generator with no floor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a generator whose first id is greater than `floor`.
    ///
    /// Used when reopening a log so new ids sort after persisted ones.
    #[must_use]
    pub fn starting_after(floor: LogId) -> Self {
        Self {
            last: Mutex::new(floor.as_i64()),
        }
    }
}

fn unix_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

impl IdSource for MonotonicIds {
    fn next(&self) -> LogId {
        let mut last = self.last.lock();
        let id = unix_nanos().max(last.saturating_add(1));
        *last = id;
        LogId::new(id)
    }
}

/// Deterministic ids `start, start + 1, start + 2, ...`.
///
/// Handy for tests and for comparing the persisted output of two runs.
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicI64,
}

impl SequentialIds {
    /// Creates a source whose first id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates a source whose first id is `start`.
    #[must_use]
    pub fn starting_at(start: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSource for SequentialIds {
    fn next(&self) -> LogId {
        LogId::new(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn sequential_counts_up() {
        let ids = SequentialIds::starting_at(10);
        assert_eq!(ids.next(), LogId::new(10));
        assert_eq!(ids.next(), LogId::new(11));
    }

    #[test]
    fn monotonic_respects_floor() {
        let ids = MonotonicIds::starting_after(LogId::new(i64::MAX - 10));
        assert_eq!(ids.next(), LogId::new(i64::MAX - 9));
        assert_eq!(ids.next(), LogId::new(i64::MAX - 8));
    }

    #[test]
    fn monotonic_strictly_increasing() {
        let ids = MonotonicIds::new();
        let mut prev = ids.next();
        for _ in 0..1000 {
            let id = ids.next();
            assert!(id > prev);
            prev = id;
        }
    }

    #[test]
    fn monotonic_unique_across_threads() {
        let ids = Arc::new(MonotonicIds::new());
        let mut handles = Vec::new();

        for _ in 0..4 {
            let ids = Arc::clone(&ids);
            handles.push(thread::spawn(move || {
                (0..500).map(|_| ids.next()).collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            let batch = handle.join().unwrap();
            assert!(batch.windows(2).all(|w| w[0] < w[1]));
            for id in batch {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 2000);
    }
}

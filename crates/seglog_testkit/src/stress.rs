//! Concurrent append drivers.
//!
//! These run many appenders against one log and collect the ids they got
//! back, so tests can check uniqueness, ordering, and durability under
//! contention.

use seglog_core::{Log, LogId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Ids returned by successful appends, per thread, in call order.
    pub ids: Vec<Vec<LogId>>,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Returns every returned id, sorted.
    pub fn sorted_ids(&self) -> Vec<LogId> {
        let mut all: Vec<LogId> = self.ids.iter().flatten().copied().collect();
        all.sort_unstable();
        all
    }

    /// Operations per second over the run.
    pub fn ops_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total_ops as f64 / secs
        } else {
            0.0
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second());
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Appends per thread.
    pub appends_per_thread: usize,
    /// Number of concurrent appenders.
    pub threads: usize,
    /// Payload size in bytes.
    pub payload_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            appends_per_thread: 100,
            threads: 4,
            payload_size: 64,
        }
    }
}

/// Runs `config.threads` appenders concurrently against `log`.
///
/// Each payload starts with the thread index and the per-thread sequence
/// number as little-endian `u32`s, padded to `payload_size`.
pub fn stress_concurrent_appends(log: Arc<Log>, config: &StressConfig) -> StressTestResult {
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let log = Arc::clone(&log);
            let failed = Arc::clone(&failed);
            let appends = config.appends_per_thread;
            let size = config.payload_size.max(8);

            thread::spawn(move || {
                let mut ids = Vec::with_capacity(appends);
                for i in 0..appends {
                    match log.append(&tagged_payload(t, i, size)) {
                        Ok(id) => ids.push(id),
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                ids
            })
        })
        .collect();

    let ids: Vec<Vec<LogId>> = handles
        .into_iter()
        .map(|h| h.join().expect("Appender thread panicked"))
        .collect();

    let successful = ids.iter().map(Vec::len).sum();
    let failed = failed.load(Ordering::Relaxed);
    StressTestResult {
        total_ops: successful + failed,
        successful_ops: successful,
        failed_ops: failed,
        ids,
        duration: start.elapsed(),
    }
}

/// Builds the payload [`stress_concurrent_appends`] writes for thread `t`,
/// sequence `i`.
pub fn tagged_payload(t: usize, i: usize, size: usize) -> Vec<u8> {
    let mut payload = Vec::with_capacity(size);
    payload.extend_from_slice(&(t as u32).to_le_bytes());
    payload.extend_from_slice(&(i as u32).to_le_bytes());
    payload.resize(size.max(8), 0xAB);
    payload
}

/// Splits a payload built by [`tagged_payload`] back into `(thread, seq)`.
pub fn payload_tag(payload: &[u8]) -> Option<(usize, usize)> {
    let t = u32::from_le_bytes(payload.get(0..4)?.try_into().ok()?);
    let i = u32::from_le_bytes(payload.get(4..8)?.try_into().ok()?);
    Some((t as usize, i as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_tag_round_trip() {
        let payload = tagged_payload(3, 41, 16);
        assert_eq!(payload.len(), 16);
        assert_eq!(payload_tag(&payload), Some((3, 41)));
        assert_eq!(payload_tag(b"short"), None);
    }
}

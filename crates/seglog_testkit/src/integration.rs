//! Cross-crate integration checks for the log.
//!
//! The helpers here are reference models and workload runners; the tests
//! at the bottom drive [`Log`] through the storage crate's stores and the
//! fault wrapper in [`crate::faults`].

use crate::fixtures::TestLog;
use seglog_core::{LogConfig, LogId, Record};
use std::collections::BTreeMap;

/// What a read should return, computed by scanning every record.
///
/// `records` must be the whole log in ascending id order.
pub fn expected_read(
    records: &[Record],
    key: LogId,
    include_key: bool,
    limit: usize,
) -> (Vec<Record>, bool) {
    let start = records.partition_point(|r| if include_key { r.id < key } else { r.id <= key });
    let found = start < records.len();
    let end = start.saturating_add(limit).min(records.len());
    (records[start..end].to_vec(), found)
}

/// Asserts that ids strictly increase.
pub fn assert_ascending(records: &[Record]) {
    for pair in records.windows(2) {
        assert!(
            pair[0].id < pair[1].id,
            "ids out of order: {} then {}",
            pair[0].id,
            pair[1].id
        );
    }
}

/// Appends `payloads` to a fresh deterministic log, closes it, and returns
/// every file it left in the store.
pub fn run_workload<P: AsRef<[u8]>>(
    config: LogConfig,
    payloads: &[P],
) -> BTreeMap<String, Vec<u8>> {
    let test = TestLog::memory(config);
    for payload in payloads {
        test.append(payload.as_ref()).expect("Failed to append");
    }
    test.close().expect("Failed to close log");
    test.store.files()
}

//! Verify command implementation.

use super::{open_existing, CommandResult};
use seglog_core::{Durability, Log, SegmentSummary};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of segments checked.
    pub segments_checked: usize,
    /// Number of records read back.
    pub records_checked: usize,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path, base_path: &str) -> CommandResult<()> {
    println!("Verifying log at {:?}", path);
    println!();

    let log = open_existing(path, base_path, Durability::Background)?;
    let result = verify_log(&log);
    log.close()?;

    println!("Segments checked: {}", result.segments_checked);
    println!("Records checked:  {}", result.records_checked);
    for error in &result.errors {
        println!("  - {}", error);
    }

    println!();
    if result.is_ok() {
        println!("✓ Log verification passed");
        Ok(())
    } else {
        println!("✗ Log verification failed");
        Err("Verification failed".into())
    }
}

/// Reads every segment back and compares it with its summary.
pub fn verify_log(log: &Log) -> VerifyResult {
    let mut result = VerifyResult::default();
    let summaries = log.segment_summaries();

    for (i, summary) in summaries.iter().enumerate() {
        result.segments_checked += 1;
        let next = summaries.get(i + 1);
        if let Err(message) = verify_segment(log, summary, next, &mut result) {
            result.errors.push(message);
        }
    }

    result
}

fn verify_segment(
    log: &Log,
    summary: &SegmentSummary,
    next: Option<&SegmentSummary>,
    result: &mut VerifyResult,
) -> Result<(), String> {
    if summary.count == 0 {
        return Ok(());
    }

    let (records, _) = log
        .get(summary.id, false, summary.count)
        .map_err(|e| format!("segment {}: {}", summary.id, e))?;

    // Records past the next boundary belong to the next segment, which
    // means this one came up short.
    let own: Vec<_> = records
        .iter()
        .filter(|r| next.map_or(true, |n| r.id < n.id))
        .collect();
    result.records_checked += own.len();

    if own.len() != summary.count {
        return Err(format!(
            "segment {}: metadata says {} records, file has {}",
            summary.id,
            summary.count,
            own.len()
        ));
    }

    if own.windows(2).any(|w| w[0].id >= w[1].id) {
        return Err(format!("segment {}: ids out of order", summary.id));
    }

    let bytes: usize = own.iter().map(|r| r.payload.len()).sum();
    if bytes != summary.byte_size {
        return Err(format!(
            "segment {}: metadata says {} payload bytes, file has {}",
            summary.id, summary.byte_size, bytes
        ));
    }

    let last = own.last().map(|r| r.id);
    if summary.last_record_id.is_some() && last != summary.last_record_id {
        return Err(format!("segment {}: last record id does not match", summary.id));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use seglog_core::LogConfig;
    use seglog_storage::{DirStore, FileStore};
    use std::sync::Arc;

    fn write_log(dir: &Path) -> Vec<SegmentSummary> {
        let store = Arc::new(DirStore::open(dir).unwrap());
        let config = LogConfig::new()
            .max_segment_records(2)
            .durability(Durability::Immediate);
        let log = Log::open(store, config).unwrap();
        for payload in [b"a", b"b", b"c"] {
            log.append(payload).unwrap();
        }
        log.segment_summaries()
    }

    #[test]
    fn healthy_log_passes() {
        let dir = tempfile::tempdir().unwrap();
        write_log(dir.path());

        let log = open_existing(dir.path(), "", Durability::Background).unwrap();
        let result = verify_log(&log);
        assert!(result.is_ok(), "{:?}", result.errors);
        assert_eq!(result.segments_checked, 2);
        assert_eq!(result.records_checked, 3);
    }

    #[test]
    fn corrupt_segment_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let summaries = write_log(dir.path());
        {
            let store = DirStore::open(dir.path()).unwrap();
            let path = format!("segment_{}", summaries[0].id.as_i64());
            store.replace(&path, b"{ broken").unwrap();
        }

        let log = open_existing(dir.path(), "", Durability::Background).unwrap();
        let result = verify_log(&log);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("corrupt"));
    }
}

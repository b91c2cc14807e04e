//! Queue-facing API.

use crate::error::CoreResult;
use crate::log::Log;
use crate::segment::Record;
use crate::types::LogId;

/// The operations a queue consumer needs from a log.
///
/// Producers append; consumers read forward from the last id they saw,
/// passing `include_key = false` to resume after it.
pub trait Queue: Send + Sync {
    /// Appends a payload and returns the new record's id.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be made durable under the
    /// log's durability mode.
    fn append(&self, payload: &[u8]) -> CoreResult<LogId>;

    /// Reads up to `limit` records from `key` onward.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment could not be loaded.
    fn get(&self, key: LogId, include_key: bool, limit: usize) -> CoreResult<(Vec<Record>, bool)>;
}

impl Queue for Log {
    fn append(&self, payload: &[u8]) -> CoreResult<LogId> {
        Log::append(self, payload)
    }

    fn get(&self, key: LogId, include_key: bool, limit: usize) -> CoreResult<(Vec<Record>, bool)> {
        Log::get(self, key, include_key, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Durability, LogConfig};
    use seglog_storage::InMemoryStore;
    use std::sync::Arc;

    fn drain(queue: &dyn Queue) -> Vec<Vec<u8>> {
        let mut cursor = LogId::MIN;
        let mut include = true;
        let mut payloads = Vec::new();
        loop {
            let (records, found) = queue.get(cursor, include, 2).unwrap();
            if !found {
                return payloads;
            }
            for record in records {
                cursor = record.id;
                payloads.push(record.payload);
            }
            include = false;
        }
    }

    #[test]
    fn consumer_resumes_after_last_id() {
        let config = LogConfig::new()
            .max_segment_records(3)
            .durability(Durability::Background);
        let log = Log::open(Arc::new(InMemoryStore::new()), config).unwrap();

        for i in 0..7u8 {
            Queue::append(&log, &[i]).unwrap();
        }

        let payloads = drain(&log);
        assert_eq!(payloads, (0..7u8).map(|i| vec![i]).collect::<Vec<_>>());
    }
}

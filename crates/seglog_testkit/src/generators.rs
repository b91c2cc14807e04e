//! Property-based test generators using proptest.

use proptest::prelude::*;

/// Strategy for a single record payload, empty payloads included.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// Strategy for a batch of payloads to append in order.
pub fn payload_batch_strategy(max_len: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(payload_strategy(), 0..=max_len)
}

/// Segment capacity settings small enough to force frequent rollover.
#[derive(Debug, Clone, Copy)]
pub struct SmallCapacity {
    /// Record limit per segment.
    pub max_records: usize,
    /// Payload byte limit per segment.
    pub max_bytes: usize,
}

/// Strategy for [`SmallCapacity`].
pub fn small_capacity_strategy() -> impl Strategy<Value = SmallCapacity> {
    (1usize..8, 1usize..256).prop_map(|(max_records, max_bytes)| SmallCapacity {
        max_records,
        max_bytes,
    })
}

/// A read against the log: start key, inclusivity, and limit.
#[derive(Debug, Clone, Copy)]
pub struct ReadRequest {
    /// Raw key, meant to land anywhere from before the first id to past
    /// the last one.
    pub key: i64,
    /// Whether a record with id equal to `key` qualifies.
    pub include_key: bool,
    /// Maximum records to return.
    pub limit: usize,
}

/// Strategy for a [`ReadRequest`] with keys in `-2..=max_key + 2`.
pub fn read_request_strategy(max_key: i64) -> impl Strategy<Value = ReadRequest> {
    (-2..=max_key + 2, any::<bool>(), 0usize..20).prop_map(|(key, include_key, limit)| {
        ReadRequest {
            key,
            include_key,
            limit,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn payload_batch_respects_bound(batch in payload_batch_strategy(10)) {
            prop_assert!(batch.len() <= 10);
        }

        #[test]
        fn small_capacity_is_nonzero(cap in small_capacity_strategy()) {
            prop_assert!(cap.max_records >= 1);
            prop_assert!(cap.max_bytes >= 1);
        }

        #[test]
        fn read_keys_cover_margins(req in read_request_strategy(10)) {
            prop_assert!((-2..=12).contains(&req.key));
        }
    }
}

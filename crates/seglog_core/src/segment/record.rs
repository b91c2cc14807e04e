//! Record type and the segment file codec.

use crate::error::{CoreError, CoreResult};
use crate::types::LogId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One appended payload.
///
/// Records are immutable once created. The id is issued at append time and
/// the timestamp is the wall-clock time of the append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Position of this record in the global order.
    pub id: LogId,
    /// When the record was appended.
    pub timestamp: DateTime<Utc>,
    /// Opaque payload bytes (base64 on disk).
    #[serde(with = "payload_base64")]
    pub payload: Vec<u8>,
}

impl Record {
    /// Creates a new record.
    #[must_use]
    pub fn new(id: LogId, timestamp: DateTime<Utc>, payload: Vec<u8>) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

mod payload_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Encodes a segment's records as indented JSON.
pub(crate) fn encode_records(records: &[Record]) -> CoreResult<Vec<u8>> {
    serde_json::to_vec_pretty(records).map_err(|e| CoreError::serialization(e.to_string()))
}

/// Decodes a segment file, checking that ids are strictly ascending.
pub(crate) fn decode_records(path: &str, data: &[u8]) -> CoreResult<Vec<Record>> {
    let records: Vec<Record> =
        serde_json::from_slice(data).map_err(|e| CoreError::corrupt(path, e.to_string()))?;

    if let Some(pair) = records.windows(2).find(|w| w[0].id >= w[1].id) {
        return Err(CoreError::corrupt(
            path,
            format!("record {} is not after record {}", pair[1].id, pair[0].id),
        ));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: i64, payload: &[u8]) -> Record {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Record::new(LogId::new(id), ts, payload.to_vec())
    }

    #[test]
    fn payload_is_base64_text() {
        let encoded = encode_records(&[record(3, b"hi")]).unwrap();
        let text = String::from_utf8(encoded).unwrap();
        assert!(text.contains("\"payload\": \"aGk=\""));
        assert!(text.contains("\"id\": 3"));
        assert!(text.contains("2023-11-14T22:13:20Z"));
    }

    #[test]
    fn decode_restores_records() {
        let records = vec![record(1, b""), record(2, &[0, 255, 7])];
        let encoded = encode_records(&records).unwrap();
        assert_eq!(decode_records("seg", &encoded).unwrap(), records);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode_records("q/segment_1", b"{not json").unwrap_err();
        assert!(matches!(err, CoreError::Corrupt { ref path, .. } if path == "q/segment_1"));
    }

    #[test]
    fn decode_rejects_unordered_ids() {
        let encoded = encode_records(&[record(5, b"a"), record(4, b"b")]).unwrap();
        assert!(matches!(
            decode_records("seg", &encoded),
            Err(CoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn decode_rejects_bad_base64() {
        let data = br#"[{"id": 1, "timestamp": "2023-11-14T22:13:20Z", "payload": "!!"}]"#;
        assert!(matches!(
            decode_records("seg", data),
            Err(CoreError::Corrupt { .. })
        ));
    }
}

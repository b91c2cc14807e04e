//! Log metadata file.
//!
//! The metadata file lists every segment of a log, oldest first, with the
//! summary needed to rebuild the segment list without reading segment
//! files, plus the capacity settings the log was written with.

use crate::config::LogConfig;
use crate::error::{CoreError, CoreResult};
use crate::types::LogId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the metadata file under the log's base path.
pub const METADATA_FILE: &str = "log_metadata";

/// Current metadata format version.
pub const METADATA_VERSION: u16 = 1;

/// Persisted summary of one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSummary {
    /// Segment id.
    pub id: LogId,
    /// When the segment was created.
    pub created_at: DateTime<Utc>,
    /// When the segment last took a record.
    pub last_modified_at: DateTime<Utc>,
    /// Number of records.
    pub count: usize,
    /// Total payload bytes.
    pub byte_size: usize,
    /// Id of the newest record, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_record_id: Option<LogId>,
}

/// Capacity settings recorded alongside the segment list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedConfig {
    /// Maximum payload bytes per segment.
    pub max_segment_bytes: usize,
    /// Maximum records per segment.
    pub max_segment_records: usize,
    /// Maximum segment age in milliseconds.
    pub max_segment_age_ms: u64,
}

impl From<&LogConfig> for PersistedConfig {
    fn from(config: &LogConfig) -> Self {
        Self {
            max_segment_bytes: config.max_segment_bytes,
            max_segment_records: config.max_segment_records,
            max_segment_age_ms: u64::try_from(config.max_segment_age.as_millis())
                .unwrap_or(u64::MAX),
        }
    }
}

/// Contents of the metadata file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMetadata {
    /// Format version.
    pub version: u16,
    /// Capacity settings.
    pub config: PersistedConfig,
    /// Segment summaries in ascending id order.
    pub segments: Vec<SegmentSummary>,
}

impl LogMetadata {
    /// Creates metadata for the given configuration and segments.
    #[must_use]
    pub fn new(config: &LogConfig, segments: Vec<SegmentSummary>) -> Self {
        Self {
            version: METADATA_VERSION,
            config: PersistedConfig::from(config),
            segments,
        }
    }

    /// Returns the store path of the metadata file for `base_path`.
    #[must_use]
    pub fn path(base_path: &str) -> String {
        format!("{base_path}{METADATA_FILE}")
    }

    /// Returns the largest id mentioned (segment or record), if any.
    #[must_use]
    pub fn max_id(&self) -> Option<LogId> {
        self.segments
            .iter()
            .map(|s| s.last_record_id.map_or(s.id, |r| r.max(s.id)))
            .max()
    }

    /// Encodes the metadata as indented JSON.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| CoreError::serialization(e.to_string()))
    }

    /// Decodes and validates a metadata file.
    pub fn decode(path: &str, data: &[u8]) -> CoreResult<Self> {
        let metadata: Self =
            serde_json::from_slice(data).map_err(|e| CoreError::corrupt(path, e.to_string()))?;

        if metadata.version > METADATA_VERSION {
            return Err(CoreError::corrupt(
                path,
                format!("unsupported metadata version: {}", metadata.version),
            ));
        }

        if metadata.segments.windows(2).any(|w| w[0].id >= w[1].id) {
            return Err(CoreError::corrupt(path, "segments are not in ascending order"));
        }

        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn summary(id: i64, count: usize) -> SegmentSummary {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        SegmentSummary {
            id: LogId::new(id),
            created_at: ts,
            last_modified_at: ts,
            count,
            byte_size: count * 3,
            last_record_id: (count > 0).then(|| LogId::new(id + count as i64)),
        }
    }

    #[test]
    fn new_metadata_records_capacity() {
        let config = LogConfig::new().max_segment_records(7);
        let metadata = LogMetadata::new(&config, Vec::new());
        assert_eq!(metadata.version, METADATA_VERSION);
        assert_eq!(metadata.config.max_segment_records, 7);
        assert_eq!(metadata.config.max_segment_age_ms, 600_000);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let metadata = LogMetadata::new(
            &LogConfig::default(),
            vec![summary(1, 2), summary(10, 0)],
        );
        let encoded = metadata.encode().unwrap();
        let decoded = LogMetadata::decode("m", &encoded).unwrap();
        assert_eq!(decoded, metadata);
    }

    #[test]
    fn encoding_is_readable_text() {
        let metadata = LogMetadata::new(&LogConfig::default(), vec![summary(1, 1)]);
        let text = String::from_utf8(metadata.encode().unwrap()).unwrap();
        assert!(text.contains("\"max_segment_records\": 10000"));
        assert!(text.contains("\"count\": 1"));
    }

    #[test]
    fn max_id_covers_records() {
        let metadata = LogMetadata::new(
            &LogConfig::default(),
            vec![summary(1, 2), summary(10, 0)],
        );
        assert_eq!(metadata.max_id(), Some(LogId::new(10)));

        let metadata = LogMetadata::new(&LogConfig::default(), vec![summary(1, 20)]);
        assert_eq!(metadata.max_id(), Some(LogId::new(21)));

        assert_eq!(LogMetadata::new(&LogConfig::default(), Vec::new()).max_id(), None);
    }

    #[test]
    fn decode_rejects_unordered_segments() {
        let metadata = LogMetadata::new(
            &LogConfig::default(),
            vec![summary(5, 0), summary(2, 0)],
        );
        let encoded = metadata.encode().unwrap();
        assert!(matches!(
            LogMetadata::decode("m", &encoded),
            Err(CoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn decode_rejects_future_version() {
        let mut metadata = LogMetadata::new(&LogConfig::default(), Vec::new());
        metadata.version = METADATA_VERSION + 1;
        let encoded = metadata.encode().unwrap();
        assert!(LogMetadata::decode("m", &encoded).is_err());
    }

    #[test]
    fn path_uses_base_prefix() {
        assert_eq!(LogMetadata::path("orders/"), "orders/log_metadata");
    }
}

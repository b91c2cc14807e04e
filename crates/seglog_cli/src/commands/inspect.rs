//! Inspect command implementation.

use super::{format_size, load_metadata, CommandResult};
use seglog_core::{LogMetadata, SegmentSummary};
use seglog_storage::DirStore;
use serde::Serialize;
use std::path::Path;

/// Log inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log directory.
    pub path: String,
    /// Prefix of the log's files.
    pub base_path: String,
    /// Metadata format version.
    pub version: u16,
    /// Record limit per segment.
    pub max_segment_records: usize,
    /// Payload byte limit per segment.
    pub max_segment_bytes: usize,
    /// Segment age limit in milliseconds.
    pub max_segment_age_ms: u64,
    /// Total records across segments.
    pub record_count: usize,
    /// Total payload bytes across segments.
    pub byte_size: usize,
    /// Per-segment summaries, oldest first.
    pub segments: Vec<SegmentSummary>,
}

impl InspectResult {
    fn from_metadata(path: &Path, base_path: &str, metadata: LogMetadata) -> Self {
        Self {
            path: path.display().to_string(),
            base_path: base_path.to_string(),
            version: metadata.version,
            max_segment_records: metadata.config.max_segment_records,
            max_segment_bytes: metadata.config.max_segment_bytes,
            max_segment_age_ms: metadata.config.max_segment_age_ms,
            record_count: metadata.segments.iter().map(|s| s.count).sum(),
            byte_size: metadata.segments.iter().map(|s| s.byte_size).sum(),
            segments: metadata.segments,
        }
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, base_path: &str, format: &str) -> CommandResult<()> {
    let store = DirStore::open(path)?;
    let metadata = load_metadata(&store, base_path)?;
    let result = InspectResult::from_metadata(path, base_path, metadata);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("seglog Log Inspection");
    println!("=====================");
    println!();
    println!("Path:      {}", result.path);
    if !result.base_path.is_empty() {
        println!("Prefix:    {}", result.base_path);
    }
    println!("Version:   {}", result.version);
    println!();
    println!("Segment limits:");
    println!("  Records: {}", result.max_segment_records);
    println!("  Bytes:   {}", format_size(result.max_segment_bytes));
    println!("  Age:     {} ms", result.max_segment_age_ms);
    println!();
    println!("Contents:");
    println!("  Segments: {}", result.segments.len());
    println!("  Records:  {}", result.record_count);
    println!("  Payload:  {}", format_size(result.byte_size));

    if !result.segments.is_empty() {
        println!();
        println!("Segments:");
        for segment in &result.segments {
            let last = segment
                .last_record_id
                .map_or_else(|| "-".to_string(), |id| id.to_string());
            println!(
                "  [{}] {} records, {}, last {}, modified {}",
                segment.id,
                segment.count,
                format_size(segment.byte_size),
                last,
                segment.last_modified_at
            );
        }
    }
}

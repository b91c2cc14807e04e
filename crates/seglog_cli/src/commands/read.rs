//! Read command implementation.

use super::{open_existing, CommandResult};
use seglog_core::{Durability, LogId, Record};
use std::path::Path;

/// Runs the read command.
pub fn run(
    path: &Path,
    base_path: &str,
    from: Option<i64>,
    include_key: bool,
    limit: usize,
    format: &str,
) -> CommandResult<()> {
    let log = open_existing(path, base_path, Durability::Background)?;
    let key = from.map_or(LogId::MIN, LogId::new);
    let (records, found) = log.get(key, include_key, limit)?;
    log.close()?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            if !found {
                println!("No records after {key}");
            }
            for record in &records {
                println!("{}", format_record(record));
            }
        }
    }

    Ok(())
}

/// One text line per record: id, timestamp, and the payload as lossy UTF-8.
fn format_record(record: &Record) -> String {
    format!(
        "{}\t{}\t{}",
        record.id.as_i64(),
        record.timestamp.to_rfc3339(),
        String::from_utf8_lossy(&record.payload)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_line_has_three_columns() {
        let timestamp = "2024-01-02T03:04:05Z".parse().unwrap();
        let record = Record::new(LogId::new(42), timestamp, b"hello".to_vec());
        assert_eq!(
            format_record(&record),
            "42\t2024-01-02T03:04:05+00:00\thello"
        );
    }
}

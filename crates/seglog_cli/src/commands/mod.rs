//! CLI command implementations.

pub mod append;
pub mod inspect;
pub mod read;
pub mod verify;

use clap::ValueEnum;
use seglog_core::{Durability, Log, LogConfig, LogMetadata};
use seglog_storage::{DirStore, FileStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Result type shared by the commands.
pub type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Durability modes as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DurabilityArg {
    /// Return once the record is on disk
    Immediate,
    /// Return at once; write within the flush interval
    Background,
    /// Return once the background flush has written the record
    BackgroundWait,
}

impl From<DurabilityArg> for Durability {
    fn from(arg: DurabilityArg) -> Self {
        match arg {
            DurabilityArg::Immediate => Durability::Immediate,
            DurabilityArg::Background => Durability::Background,
            DurabilityArg::BackgroundWait => Durability::BackgroundWait,
        }
    }
}

/// Reads the metadata of an existing log, failing if there is none.
pub fn load_metadata(store: &dyn FileStore, base_path: &str) -> CommandResult<LogMetadata> {
    let path = LogMetadata::path(base_path);
    let data = store
        .load_and_repair(&path)?
        .ok_or_else(|| format!("No log found at {path:?}"))?;
    Ok(LogMetadata::decode(&path, &data)?)
}

/// Opens an existing log in `dir`, keeping the capacity settings it was
/// written with.
pub fn open_existing(dir: &Path, base_path: &str, durability: Durability) -> CommandResult<Log> {
    let store = Arc::new(DirStore::open(dir)?);
    let metadata = load_metadata(store.as_ref(), base_path)?;

    let config = LogConfig::new()
        .base_path(base_path)
        .max_segment_bytes(metadata.config.max_segment_bytes)
        .max_segment_records(metadata.config.max_segment_records)
        .max_segment_age(Duration::from_millis(metadata.config.max_segment_age_ms))
        .durability(durability);

    Ok(Log::open(store, config)?)
}

/// Opens the log in `dir`, creating it with default settings if needed.
pub fn open_or_create(dir: &Path, base_path: &str, durability: Durability) -> CommandResult<Log> {
    let store = DirStore::open(dir)?;
    if store.exists(&LogMetadata::path(base_path))? {
        drop(store);
        return open_existing(dir, base_path, durability);
    }

    let config = LogConfig::new().base_path(base_path).durability(durability);
    Ok(Log::open(Arc::new(store), config)?)
}

/// Formats a byte count for humans.
pub fn format_size(bytes: usize) -> String {
    let bytes = bytes as f64;
    if bytes < 1024.0 {
        format!("{bytes}")
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.1} KB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.1} MB", bytes / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_log_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_existing(dir.path(), "", Durability::Immediate).unwrap_err();
        assert!(err.to_string().contains("No log found"));
    }

    #[test]
    fn reopen_keeps_capacity() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = Arc::new(DirStore::open(dir.path()).unwrap());
            let config = LogConfig::new().max_segment_records(3);
            Log::open(store, config).unwrap();
        }
        let log = open_existing(dir.path(), "", Durability::Background).unwrap();
        assert_eq!(log.config().max_segment_records, 3);
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(512), "512");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}

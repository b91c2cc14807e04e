//! Append command implementation.

use super::{open_or_create, CommandResult};
use seglog_core::{Durability, LogId};
use std::path::Path;
use tracing::info;

/// Runs the append command, printing one id per payload.
pub fn run(
    path: &Path,
    base_path: &str,
    payloads: &[String],
    durability: Durability,
) -> CommandResult<()> {
    let ids = append(path, base_path, payloads, durability)?;
    for id in &ids {
        println!("{}", id.as_i64());
    }
    Ok(())
}

fn append(
    path: &Path,
    base_path: &str,
    payloads: &[String],
    durability: Durability,
) -> CommandResult<Vec<LogId>> {
    let log = open_or_create(path, base_path, durability)?;

    let mut ids = Vec::with_capacity(payloads.len());
    for payload in payloads {
        ids.push(log.append(payload.as_bytes())?);
    }
    log.close()?;

    info!(count = ids.len(), ?durability, "appended");
    Ok(ids)
}

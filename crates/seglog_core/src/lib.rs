//! # seglog Core
//!
//! Segmented append-only log engine for seglog.
//!
//! This crate provides:
//! - [`Record`] and [`Segment`]: bounded, individually persisted runs of records
//! - [`Log`]: the ordered segment list, rollover, range reads, and the
//!   durability-coordination engine that coalesces flushes across appenders
//! - [`IdSource`] and [`Clock`]: the identifier and time collaborators
//! - [`Queue`]: the queue-facing API implemented by [`Log`]
//!
//! ## Example
//!
//! ```rust
//! use seglog_core::{Durability, Log, LogConfig, LogId};
//! use seglog_storage::InMemoryStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let log = Log::open(store, LogConfig::new().durability(Durability::Immediate)).unwrap();
//!
//! log.append(b"hello").unwrap();
//! log.append(b"world").unwrap();
//!
//! let (records, found) = log.get(LogId::MIN, true, 10).unwrap();
//! assert!(found);
//! assert_eq!(records[1].payload, b"world");
//! log.close().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod error;
mod ids;
mod log;
mod metadata;
mod queue;
mod segment;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Durability, FaultPolicy, LogConfig};
pub use error::{CoreError, CoreResult};
pub use ids::{IdSource, MonotonicIds, SequentialIds};
pub use log::Log;
pub use metadata::{LogMetadata, PersistedConfig, SegmentSummary, METADATA_FILE, METADATA_VERSION};
pub use queue::Queue;
pub use segment::{Record, Segment, SEGMENT_FILE_PREFIX};
pub use types::LogId;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # seglog Testkit
//!
//! Test utilities for seglog.
//!
//! This crate provides:
//! - Log fixtures with deterministic ids and time, in memory or on disk
//! - A fault-injecting store wrapper for flush failure scenarios
//! - Property-based test generators using proptest
//! - Concurrent append drivers
//! - Cross-crate integration tests of the log's durability contracts
//!
//! ## Usage
//!
//! ```rust
//! use seglog_core::{Durability, LogConfig, LogId};
//! use seglog_testkit::prelude::*;
//!
//! let test = TestLog::memory(LogConfig::new().durability(Durability::Immediate));
//! test.append(b"payload").unwrap();
//! assert_eq!(read_all(&test).len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;

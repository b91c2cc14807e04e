//! # seglog Storage
//!
//! Path-addressed file store trait and implementations for seglog.
//!
//! This crate provides the lowest-level storage abstraction for seglog.
//! Stores are **opaque file stores** - they do not interpret the bytes
//! they hold.
//!
//! ## Design Principles
//!
//! - Every write replaces a whole file atomically (no partial writes)
//! - Reads may repair the debris of an interrupted replace
//! - No knowledge of segments, records, or metadata layouts
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral logs
//! - [`DirStore`] - For persistent storage rooted at a directory
//!
//! ## Example
//!
//! ```rust
//! use seglog_storage::{FileStore, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! store.replace("queue/segment_1", b"hello world").unwrap();
//! let data = store.load_and_repair("queue/segment_1").unwrap();
//! assert_eq!(data.as_deref(), Some(&b"hello world"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::FileStore;
pub use error::{StorageError, StorageResult};
pub use file::DirStore;
pub use memory::InMemoryStore;

//! Segments: bounded runs of records, one file each.
//!
//! A segment is created with its first record, accepts appends while it is
//! the tail of the log and under its capacity limits, and is written out as
//! a whole file on every flush.
//!
//! ## Segment File Format
//!
//! ```text
//! <base_path>segment_<id>
//! [
//!   { "id": <i64>, "timestamp": "<RFC 3339>", "payload": "<base64>" },
//!   ...
//! ]
//! ```
//!
//! Records are stored in ascending id order.

mod record;
mod store;

pub use record::Record;
pub use store::{Segment, SEGMENT_FILE_PREFIX};

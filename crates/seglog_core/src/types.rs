//! Core type definitions for seglog.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a record or a segment.
///
/// Record ids and segment ids are drawn from the same [`crate::IdSource`],
/// so they share one total order: a segment's id is smaller than the id of
/// every record it holds, and later segments have larger ids. Read keys are
/// compared against both.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LogId(pub i64);

impl LogId {
    /// The smallest possible id; `get(LogId::MIN, true, n)` reads from the start.
    pub const MIN: Self = Self(i64::MIN);

    /// The largest possible id.
    pub const MAX: Self = Self(i64::MAX);

    /// Creates a new id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id:{}", self.0)
    }
}

impl From<i64> for LogId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_id_ordering() {
        assert!(LogId::new(1) < LogId::new(2));
        assert!(LogId::MIN < LogId::new(i64::MIN + 1));
    }

    #[test]
    fn log_id_display() {
        assert_eq!(format!("{}", LogId::new(42)), "id:42");
    }

    #[test]
    fn log_id_serializes_as_bare_number() {
        let json = serde_json::to_string(&LogId::new(-5)).unwrap();
        assert_eq!(json, "-5");
    }
}

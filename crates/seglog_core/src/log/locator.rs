//! Maps a read key to the segment that holds it.
//!
//! Segment ids are segment *boundaries*: every record in a segment has an
//! id above the segment's id and below the next segment's id. A key can
//! therefore fall into the gap between one segment's last record and the
//! next segment's id, which is why the segment before the boundary is
//! probed before the one after it is chosen.

use crate::error::CoreResult;
use crate::segment::Segment;
use crate::types::LogId;
use std::sync::Arc;

/// Returns the index of the segment where a read from `key` starts.
///
/// `probe` reports whether a segment contains a record matching `key`; it
/// is responsible for loading the segment first.
///
/// - keys below the first boundary start at the first segment
/// - otherwise the segment just below the first boundary `> key` is probed,
///   falling through to the segment after it
/// - `None` when the key is beyond every record
pub(crate) fn find_segment<F>(
    segments: &[Arc<Segment>],
    key: LogId,
    mut probe: F,
) -> CoreResult<Option<usize>>
where
    F: FnMut(&Segment) -> CoreResult<bool>,
{
    if segments.is_empty() {
        return Ok(None);
    }

    let idx = segments.partition_point(|s| s.id() <= key);
    if idx == 0 {
        return Ok(Some(0));
    }

    if probe(&segments[idx - 1])? {
        return Ok(Some(idx - 1));
    }

    if idx < segments.len() {
        Ok(Some(idx))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::ids::{IdSource, SequentialIds};

    /// Builds segments with the given record counts from one id source.
    /// With sequential ids a segment with n records spans n + 1 ids.
    fn build(counts: &[usize]) -> Vec<Arc<Segment>> {
        let ids: Arc<dyn IdSource> = Arc::new(SequentialIds::new());
        counts
            .iter()
            .map(|&n| {
                let seg = Arc::new(Segment::create(ids.clone(), Arc::new(SystemClock)));
                for _ in 0..n {
                    seg.append(b"p").unwrap();
                }
                seg
            })
            .collect()
    }

    fn find(segments: &[Arc<Segment>], key: i64, include: bool) -> Option<usize> {
        let key = LogId::new(key);
        find_segment(segments, key, |s| Ok(s.locate(key, 1, include).1)).unwrap()
    }

    #[test]
    fn empty_log_finds_nothing() {
        assert_eq!(find(&[], 5, true), None);
    }

    #[test]
    fn key_before_first_boundary_clamps_to_first() {
        // segments: [1: 2,3] [4: 5,6]
        let segments = build(&[2, 2]);
        assert_eq!(find(&segments, -100, true), Some(0));
        assert_eq!(find(&segments, 0, true), Some(0));
    }

    #[test]
    fn key_inside_segment() {
        let segments = build(&[2, 2]);
        assert_eq!(find(&segments, 2, true), Some(0));
        assert_eq!(find(&segments, 2, false), Some(0));
        assert_eq!(find(&segments, 5, true), Some(1));
    }

    #[test]
    fn key_in_gap_moves_to_next_segment() {
        let segments = build(&[2, 2]);
        // 3 is the last record of segment 0; exclusive read starts after it.
        assert_eq!(find(&segments, 3, false), Some(1));
        // 4 is the boundary id of segment 1, not a record.
        assert_eq!(find(&segments, 4, true), Some(1));
    }

    #[test]
    fn key_in_tail_is_found() {
        let segments = build(&[2, 3]);
        // tail: [4: 5,6,7]
        assert_eq!(find(&segments, 6, true), Some(1));
        assert_eq!(find(&segments, 6, false), Some(1));
    }

    #[test]
    fn key_beyond_tail_is_not_found() {
        let segments = build(&[2, 2]);
        assert_eq!(find(&segments, 6, false), None);
        assert_eq!(find(&segments, 100, true), None);
    }
}

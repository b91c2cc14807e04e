//! Flush coordination state.
//!
//! Appenders register work here; each flush cycle swaps the whole set out
//! under the lock and performs the I/O with the lock released. Work that
//! fails is merged back in for the next cycle.

use crate::error::{CoreError, CoreResult};
use crate::segment::Segment;
use crate::types::LogId;
use std::collections::BTreeMap;
use std::mem;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;

/// Sending half of a one-shot flush acknowledgement.
#[derive(Debug)]
pub(crate) struct Completion(SyncSender<CoreResult<()>>);

/// Receiving half of a one-shot flush acknowledgement.
#[derive(Debug)]
pub(crate) struct CompletionWaiter(Receiver<CoreResult<()>>);

/// Creates a connected completion pair.
pub(crate) fn completion() -> (Completion, CompletionWaiter) {
    let (tx, rx) = sync_channel(1);
    (Completion(tx), CompletionWaiter(rx))
}

impl Completion {
    /// Delivers the outcome. The waiter may already be gone.
    pub(crate) fn complete(self, outcome: CoreResult<()>) {
        let _ = self.0.send(outcome);
    }
}

impl CompletionWaiter {
    /// Blocks until the outcome arrives.
    ///
    /// A completion dropped without an outcome means the log went away
    /// with the flush still pending.
    pub(crate) fn wait(self) -> CoreResult<()> {
        self.0
            .recv()
            .unwrap_or_else(|_| Err(CoreError::flush_abandoned("log dropped before flush")))
    }
}

/// A segment awaiting flush and the callers waiting on it.
#[derive(Debug)]
pub(crate) struct PendingSegment {
    pub(crate) segment: Arc<Segment>,
    pub(crate) waiters: Vec<Completion>,
}

/// Everything the next flush cycle has to do.
#[derive(Debug, Default)]
pub(crate) struct PendingFlushes {
    /// The metadata file is behind the segment list.
    pub(crate) metadata_dirty: bool,
    /// Segments to persist, one entry per segment however many appends.
    pub(crate) segments: BTreeMap<LogId, PendingSegment>,
    /// Callers waiting for the next metadata write.
    pub(crate) metadata_waiters: Vec<Completion>,
    /// No further registrations are accepted.
    pub(crate) closed: bool,
    /// The flusher gave up after a fault; the message is that fault.
    pub(crate) halted: Option<String>,
}

/// One cycle's worth of work, detached from [`PendingFlushes`].
#[derive(Debug, Default)]
pub(crate) struct FlushBatch {
    pub(crate) metadata_dirty: bool,
    pub(crate) segments: BTreeMap<LogId, PendingSegment>,
    pub(crate) metadata_waiters: Vec<Completion>,
}

impl PendingFlushes {
    /// Returns whether there is nothing to write.
    pub(crate) fn is_idle(&self) -> bool {
        !self.metadata_dirty && self.segments.is_empty()
    }

    /// Returns an error if new work can no longer be registered.
    pub(crate) fn admit(&self) -> CoreResult<()> {
        if self.closed {
            return Err(CoreError::LogClosed);
        }
        match &self.halted {
            Some(reason) => Err(CoreError::flush_abandoned(reason.clone())),
            None => Ok(()),
        }
    }

    /// Records that `segment` needs a flush, optionally with a waiter.
    pub(crate) fn register(&mut self, segment: &Arc<Segment>, waiter: Option<Completion>) {
        let entry = self
            .segments
            .entry(segment.id())
            .or_insert_with(|| PendingSegment {
                segment: Arc::clone(segment),
                waiters: Vec::new(),
            });
        entry.waiters.extend(waiter);
    }

    /// Moves all pending work into a batch, leaving this set empty.
    pub(crate) fn take(&mut self) -> FlushBatch {
        FlushBatch {
            metadata_dirty: mem::take(&mut self.metadata_dirty),
            segments: mem::take(&mut self.segments),
            metadata_waiters: mem::take(&mut self.metadata_waiters),
        }
    }

    /// Puts an unfinished segment back, merging with any newer registration.
    pub(crate) fn requeue(&mut self, pending: PendingSegment) {
        match self.segments.get_mut(&pending.segment.id()) {
            Some(entry) => {
                let newer = mem::replace(&mut entry.waiters, pending.waiters);
                entry.waiters.extend(newer);
            }
            None => {
                self.segments.insert(pending.segment.id(), pending);
            }
        }
    }

    /// Puts back the metadata part of a batch whose write did not happen.
    pub(crate) fn requeue_metadata(&mut self, was_dirty: bool, waiters: Vec<Completion>) {
        self.metadata_dirty |= was_dirty;
        let newer = mem::replace(&mut self.metadata_waiters, waiters);
        self.metadata_waiters.extend(newer);
    }

    /// Fails every outstanding waiter; used once the log can no longer flush.
    pub(crate) fn abandon_waiters(&mut self, reason: &str) {
        let segment_waiters = self
            .segments
            .values_mut()
            .flat_map(|entry| mem::take(&mut entry.waiters));
        let metadata_waiters = mem::take(&mut self.metadata_waiters);

        for waiter in segment_waiters.chain(metadata_waiters) {
            waiter.complete(Err(CoreError::flush_abandoned(reason)));
        }
    }

    /// Stops accepting work after a fatal flush fault and fails everyone
    /// still waiting.
    pub(crate) fn halt(&mut self, reason: &str) {
        self.halted = Some(reason.to_string());
        self.abandon_waiters(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::ids::SequentialIds;

    fn segment(ids: &Arc<SequentialIds>) -> Arc<Segment> {
        Arc::new(Segment::create(ids.clone(), Arc::new(SystemClock)))
    }

    #[test]
    fn register_coalesces_per_segment() {
        let ids = Arc::new(SequentialIds::new());
        let seg = segment(&ids);
        let mut pending = PendingFlushes::default();

        let (a, _wa) = completion();
        let (b, _wb) = completion();
        pending.register(&seg, Some(a));
        pending.register(&seg, None);
        pending.register(&seg, Some(b));

        assert_eq!(pending.segments.len(), 1);
        assert_eq!(pending.segments[&seg.id()].waiters.len(), 2);
    }

    #[test]
    fn take_leaves_set_empty() {
        let ids = Arc::new(SequentialIds::new());
        let mut pending = PendingFlushes::default();
        pending.metadata_dirty = true;
        pending.register(&segment(&ids), None);

        let batch = pending.take();
        assert!(batch.metadata_dirty);
        assert_eq!(batch.segments.len(), 1);
        assert!(pending.is_idle());
    }

    #[test]
    fn requeue_merges_waiters() {
        let ids = Arc::new(SequentialIds::new());
        let seg = segment(&ids);
        let mut pending = PendingFlushes::default();

        let (old, _wo) = completion();
        pending.register(&seg, Some(old));
        let mut batch = pending.take();

        let (new, _wn) = completion();
        pending.register(&seg, Some(new));

        let entry = batch.segments.remove(&seg.id()).unwrap();
        pending.requeue(entry);
        assert_eq!(pending.segments[&seg.id()].waiters.len(), 2);
    }

    #[test]
    fn abandon_notifies_waiters() {
        let ids = Arc::new(SequentialIds::new());
        let mut pending = PendingFlushes::default();

        let (seg_done, seg_wait) = completion();
        let (meta_done, meta_wait) = completion();
        pending.register(&segment(&ids), Some(seg_done));
        pending.metadata_waiters.push(meta_done);

        pending.abandon_waiters("closing");
        assert!(matches!(seg_wait.wait(), Err(CoreError::FlushAbandoned { .. })));
        assert!(matches!(meta_wait.wait(), Err(CoreError::FlushAbandoned { .. })));
    }

    #[test]
    fn halt_refuses_new_work_and_fails_waiters() {
        let ids = Arc::new(SequentialIds::new());
        let mut pending = PendingFlushes::default();
        let (done, wait) = completion();
        pending.register(&segment(&ids), Some(done));
        assert!(pending.admit().is_ok());

        pending.halt("disk full");
        assert!(matches!(wait.wait(), Err(CoreError::FlushAbandoned { .. })));
        match pending.admit() {
            Err(CoreError::FlushAbandoned { message }) => assert_eq!(message, "disk full"),
            other => panic!("expected FlushAbandoned, got {other:?}"),
        }

        pending.closed = true;
        assert!(matches!(pending.admit(), Err(CoreError::LogClosed)));
    }

    #[test]
    fn dropped_completion_is_abandoned() {
        let (done, wait) = completion();
        drop(done);
        assert!(matches!(wait.wait(), Err(CoreError::FlushAbandoned { .. })));
    }
}

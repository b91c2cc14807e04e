//! The segmented log and its durability engine.
//!
//! ## Appends
//!
//! Appends go to the tail segment under the shared segment-list lock. Only
//! when the tail refuses (full, too old, or unloaded) does an appender take
//! the list lock exclusively, re-check the tail, and create a new one, so a
//! rollover happens once per overflow no matter how many appenders race.
//!
//! ## Durability
//!
//! Every append registers its segment with the pending flush set. What
//! happens next depends on [`Durability`]:
//!
//! | mode             | append returns                               |
//! |------------------|----------------------------------------------|
//! | `Immediate`      | after this caller runs a flush cycle itself  |
//! | `Background`     | at once; the background cycle writes later   |
//! | `BackgroundWait` | after the background cycle acknowledges it   |
//!
//! A flush cycle swaps the pending set out under a short lock, noting the
//! segment summaries at the same moment, and writes each segment once,
//! however many appends it took. The metadata written afterwards is that
//! snapshot, so it never names a segment whose file is not yet written. The first failing
//! segment stops the cycle; it and the segments not yet attempted go back
//! into the pending set, waiters included, for the next cycle.
//!
//! ## Files
//!
//! ```text
//! <base_path>log_metadata     # segment summaries + capacity settings
//! <base_path>segment_<id>     # one per segment
//! ```

mod background;
mod flush;
mod locator;

use crate::clock::{Clock, SystemClock};
use crate::config::{Durability, FaultPolicy, LogConfig};
use crate::error::{CoreError, CoreResult};
use crate::ids::{IdSource, MonotonicIds};
use crate::metadata::{LogMetadata, PersistedConfig, SegmentSummary};
use crate::segment::{Record, Segment};
use crate::types::LogId;
use background::BackgroundFlusher;
use flush::{completion, CompletionWaiter, FlushBatch, PendingFlushes};
use parking_lot::{Mutex, RwLock};
use seglog_storage::FileStore;
use std::mem;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// An append-only log of records split into segments.
///
/// `Log` is `Send + Sync`; share it between threads with an [`Arc`].
/// Dropping the log closes it.
///
/// # Example
///
/// ```rust
/// use seglog_core::{Durability, Log, LogConfig, LogId};
/// use seglog_storage::InMemoryStore;
/// use std::sync::Arc;
///
/// let config = LogConfig::new()
///     .max_segment_records(2)
///     .durability(Durability::Background);
/// let log = Log::open(Arc::new(InMemoryStore::new()), config).unwrap();
///
/// for payload in [b"a", b"b", b"c"] {
///     log.append(payload).unwrap();
/// }
/// assert_eq!(log.segment_count(), 2);
///
/// log.flush_all().unwrap();
/// let (records, _) = log.get(LogId::MIN, true, usize::MAX).unwrap();
/// assert_eq!(records.len(), 3);
/// ```
pub struct Log {
    inner: Arc<LogInner>,
    flusher: Mutex<Option<BackgroundFlusher>>,
}

/// State shared between the log handle and its flush thread.
pub(crate) struct LogInner {
    pub(crate) config: LogConfig,
    store: Arc<dyn FileStore>,
    ids: Arc<dyn IdSource>,
    clock: Arc<dyn Clock>,
    /// Data lock over the segment list; never held across I/O.
    segments: RwLock<Vec<Arc<Segment>>>,
    /// Pending flush work; short critical sections only.
    pending: Mutex<PendingFlushes>,
    /// Persistence lock: one flush cycle at a time.
    flush_lock: Mutex<()>,
}

impl Log {
    /// Opens the log stored under `config.base_path`, creating it if the
    /// metadata file does not exist.
    ///
    /// Ids come from a [`MonotonicIds`] seeded past every id in the
    /// metadata; timestamps from the system clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read or decoded, the
    /// initial metadata write fails, or the flush thread cannot start.
    pub fn open(store: Arc<dyn FileStore>, config: LogConfig) -> CoreResult<Self> {
        Self::open_inner(store, config, None, Arc::new(SystemClock))
    }

    /// Opens the log with explicit id and time sources.
    ///
    /// When reopening, `ids` must issue values above every id already in
    /// the log.
    ///
    /// # Errors
    ///
    /// Same as [`Log::open`].
    pub fn open_with(
        store: Arc<dyn FileStore>,
        config: LogConfig,
        ids: Arc<dyn IdSource>,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Self> {
        Self::open_inner(store, config, Some(ids), clock)
    }

    fn open_inner(
        store: Arc<dyn FileStore>,
        config: LogConfig,
        ids: Option<Arc<dyn IdSource>>,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Self> {
        let metadata_path = LogMetadata::path(&config.base_path);
        let existing = match store.load_and_repair(&metadata_path)? {
            Some(data) => Some(LogMetadata::decode(&metadata_path, &data)?),
            None => None,
        };

        let ids = ids.unwrap_or_else(|| {
            let floor = existing
                .as_ref()
                .and_then(LogMetadata::max_id)
                .unwrap_or(LogId::MIN);
            Arc::new(MonotonicIds::starting_after(floor))
        });

        let segments: Vec<Arc<Segment>> = existing
            .iter()
            .flat_map(|metadata| &metadata.segments)
            .map(|summary| Arc::new(Segment::restore(summary, ids.clone(), clock.clone())))
            .collect();

        if let Some(metadata) = &existing {
            if metadata.config != PersistedConfig::from(&config) {
                debug!(
                    persisted = ?metadata.config,
                    "capacity settings changed since the log was written"
                );
            }
        }

        let created = existing.is_none();
        let inner = Arc::new(LogInner {
            config,
            store,
            ids,
            clock,
            segments: RwLock::new(segments),
            pending: Mutex::new(PendingFlushes {
                metadata_dirty: created,
                ..PendingFlushes::default()
            }),
            flush_lock: Mutex::new(()),
        });

        if created {
            inner.flush_all()?;
        }

        let flusher = BackgroundFlusher::spawn(Arc::clone(&inner))?;

        info!(
            base_path = %inner.config.base_path,
            segments = inner.segments.read().len(),
            durability = ?inner.config.durability,
            created,
            "log opened"
        );

        Ok(Self {
            inner,
            flusher: Mutex::new(Some(flusher)),
        })
    }

    /// Appends a record and returns its id once the configured durability
    /// contract holds.
    ///
    /// # Errors
    ///
    /// - [`CoreError::LogClosed`] after [`Log::close`]
    /// - [`CoreError::FlushAbandoned`] once a background fault has halted
    ///   the log under [`FaultPolicy::Panic`]
    /// - in `Immediate` and `BackgroundWait` modes, the flush error if the
    ///   record could not be made durable. The record stays buffered and
    ///   will be retried by later flush cycles, but is not yet durable.
    pub fn append(&self, payload: &[u8]) -> CoreResult<LogId> {
        self.inner.append(payload)
    }

    /// Reads up to `limit` records starting at the first record with id
    /// `> key` (`>= key` when `include_key`), continuing across segment
    /// boundaries. Unloaded segments are loaded on the way.
    ///
    /// Returns `found = false` when no record qualifies.
    ///
    /// # Errors
    ///
    /// Returns an error if a needed segment cannot be loaded.
    pub fn get(
        &self,
        key: LogId,
        include_key: bool,
        limit: usize,
    ) -> CoreResult<(Vec<Record>, bool)> {
        self.inner.get(key, include_key, limit)
    }

    /// Runs one flush cycle now: writes every pending segment and, if the
    /// segment list changed, the metadata file.
    ///
    /// # Errors
    ///
    /// Returns the first segment or metadata write error; unfinished work
    /// stays queued for the next cycle.
    pub fn flush_all(&self) -> CoreResult<()> {
        self.inner.flush_all()
    }

    /// Stops the background flush thread after a final flush and returns
    /// that flush's result. Further appends fail with
    /// [`CoreError::LogClosed`]; reads keep working.
    ///
    /// Callers still waiting on a flush when the final flush fails get
    /// [`CoreError::FlushAbandoned`].
    ///
    /// # Errors
    ///
    /// Returns the final flush error.
    pub fn close(&self) -> CoreResult<()> {
        self.inner.pending.lock().closed = true;

        let Some(flusher) = self.flusher.lock().take() else {
            return Ok(());
        };

        let result = flusher.stop();
        if let Err(err) = &result {
            self.inner.pending.lock().abandon_waiters(&err.to_string());
        }
        info!(base_path = %self.inner.config.base_path, ok = result.is_ok(), "log closed");
        result
    }

    /// Unloads clean, non-tail segments idle for longer than `max_idle`.
    /// Returns how many were unloaded.
    pub fn unload_idle(&self, max_idle: Duration) -> usize {
        self.inner.unload_idle(Some(max_idle))
    }

    /// Unloads every clean, non-tail segment. Returns how many were unloaded.
    pub fn unload_all(&self) -> usize {
        self.inner.unload_idle(None)
    }

    /// Removes a segment and its file, for external retention policies.
    ///
    /// The metadata is rewritten without the segment before the file is
    /// deleted, so a crash in between leaves an orphan file rather than a
    /// dangling summary.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidOperation`] if the segment does not exist, is
    /// the tail, or has unflushed records; otherwise the flush or store
    /// error.
    pub fn remove_segment(&self, id: LogId) -> CoreResult<()> {
        self.inner.remove_segment(id)
    }

    /// Returns the summaries of all segments, oldest first.
    #[must_use]
    pub fn segment_summaries(&self) -> Vec<SegmentSummary> {
        self.inner
            .segments
            .read()
            .iter()
            .map(|s| s.summary())
            .collect()
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.inner.segments.read().len()
    }

    /// Returns the number of records across all segments.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.inner.segments.read().iter().map(|s| s.count()).sum()
    }

    /// Returns the durability mode.
    #[must_use]
    pub fn durability(&self) -> Durability {
        self.inner.config.durability
    }

    /// Returns the configuration the log was opened with.
    #[must_use]
    pub fn config(&self) -> &LogConfig {
        &self.inner.config
    }
}

/// What an append registered, and what its caller may have to wait on.
struct Appended {
    id: LogId,
    segment_flushed: Option<CompletionWaiter>,
    metadata_flushed: Option<CompletionWaiter>,
}

impl Drop for Log {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            error!(error = %err, "final flush failed while dropping log");
        }
    }
}

impl std::fmt::Debug for Log {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Log")
            .field("base_path", &self.inner.config.base_path)
            .field("durability", &self.inner.config.durability)
            .field("segments", &self.segment_count())
            .finish_non_exhaustive()
    }
}

impl LogInner {
    fn append(&self, payload: &[u8]) -> CoreResult<LogId> {
        let Appended {
            id,
            segment_flushed,
            metadata_flushed,
        } = self.append_to_tail(payload)?;

        match self.config.durability {
            Durability::Immediate => self.flush_all()?,
            Durability::Background => {}
            Durability::BackgroundWait => {
                if let Some(flushed) = segment_flushed {
                    flushed.wait()?;
                }
                if let Some(flushed) = metadata_flushed {
                    flushed.wait()?;
                }
            }
        }

        Ok(id)
    }

    /// Appends to the tail, rolling over to a new segment if it refuses,
    /// and registers the flush before any lock is released.
    ///
    /// The pending lock is held from the closed check to the registration,
    /// so a record that becomes readable is always flushed by the cycle
    /// that `close` runs last.
    fn append_to_tail(&self, payload: &[u8]) -> CoreResult<Appended> {
        {
            let segments = self.segments.read();
            let mut pending = self.pending.lock();
            pending.admit()?;
            if let Some((tail, id)) = self.try_tail(&segments, payload)? {
                return Ok(self.register(&mut pending, &tail, id, false));
            }
        }

        let mut segments = self.segments.write();
        let mut pending = self.pending.lock();
        pending.admit()?;
        // Another appender may have rolled over while we waited.
        if let Some((tail, id)) = self.try_tail(&segments, payload)? {
            return Ok(self.register(&mut pending, &tail, id, false));
        }

        let segment = Arc::new(Segment::create(
            Arc::clone(&self.ids),
            Arc::clone(&self.clock),
        ));
        let id = segment.append(payload)?;
        segments.push(Arc::clone(&segment));
        let appended = self.register(&mut pending, &segment, id, true);
        drop(pending);
        drop(segments);

        debug!(segment = %segment.id(), "segment created");
        Ok(appended)
    }

    fn try_tail(
        &self,
        segments: &[Arc<Segment>],
        payload: &[u8],
    ) -> CoreResult<Option<(Arc<Segment>, LogId)>> {
        let Some(tail) = segments.last() else {
            return Ok(None);
        };
        let accepted = tail.try_append(
            payload,
            self.config.max_segment_bytes,
            self.config.max_segment_records,
            self.config.max_segment_age,
        )?;
        Ok(accepted.map(|id| (Arc::clone(tail), id)))
    }

    /// Queues a segment flush. Every append changes the segment summaries,
    /// so the metadata is marked dirty too.
    fn register(
        &self,
        pending: &mut PendingFlushes,
        segment: &Arc<Segment>,
        id: LogId,
        created: bool,
    ) -> Appended {
        pending.metadata_dirty = true;
        if self.config.durability != Durability::BackgroundWait {
            pending.register(segment, None);
            return Appended {
                id,
                segment_flushed: None,
                metadata_flushed: None,
            };
        }

        let (segment_done, segment_flushed) = completion();
        pending.register(segment, Some(segment_done));
        // Metadata only needs a fresh write when this append grew the
        // segment list; otherwise it is already acknowledged.
        let metadata_flushed = created.then(|| {
            let (done, flushed) = completion();
            pending.metadata_waiters.push(done);
            flushed
        });

        Appended {
            id,
            segment_flushed: Some(segment_flushed),
            metadata_flushed,
        }
    }

    pub(crate) fn flush_all(&self) -> CoreResult<()> {
        let _flush = self.flush_lock.lock();

        // Every segment in the list is registered before either lock is
        // released, so a summary taken here names only segments that are
        // already on the store or in this batch.
        let (batch, summaries) = {
            let segments = self.segments.read();
            let mut pending = self.pending.lock();
            if pending.is_idle() {
                let waiters = mem::take(&mut pending.metadata_waiters);
                drop(pending);
                for waiter in waiters {
                    waiter.complete(Ok(()));
                }
                return Ok(());
            }
            let batch = pending.take();
            let summaries: Option<Vec<SegmentSummary>> = batch
                .metadata_dirty
                .then(|| segments.iter().map(|s| s.summary()).collect());
            (batch, summaries)
        };

        let FlushBatch {
            metadata_dirty,
            segments,
            metadata_waiters,
        } = batch;
        trace!(segments = segments.len(), metadata_dirty, "flush cycle");

        let mut queued = segments.into_values();
        let mut failure = None;
        for entry in queued.by_ref() {
            match entry.segment.persist(self.store.as_ref(), &self.config.base_path) {
                Ok(()) => {
                    for waiter in entry.waiters {
                        waiter.complete(Ok(()));
                    }
                }
                Err(err) => {
                    failure = Some((err, entry));
                    break;
                }
            }
        }

        if let Some((err, failed)) = failure {
            warn!(segment = %failed.segment.id(), error = %err, "flush failed, requeued");
            let mut pending = self.pending.lock();
            pending.requeue(failed);
            for entry in queued {
                pending.requeue(entry);
            }
            pending.requeue_metadata(metadata_dirty, metadata_waiters);
            return Err(err);
        }

        if let Some(summaries) = summaries {
            if let Err(err) = self.write_metadata(summaries) {
                warn!(error = %err, "metadata write failed, requeued");
                self.pending
                    .lock()
                    .requeue_metadata(true, metadata_waiters);
                return Err(err);
            }
        }

        for waiter in metadata_waiters {
            waiter.complete(Ok(()));
        }
        Ok(())
    }

    fn write_metadata(&self, summaries: Vec<SegmentSummary>) -> CoreResult<()> {
        let encoded = LogMetadata::new(&self.config, summaries).encode()?;
        self.store
            .replace(&LogMetadata::path(&self.config.base_path), &encoded)?;
        Ok(())
    }

    /// One tick of the background thread.
    pub(crate) fn background_cycle(&self) {
        if let Err(err) = self.flush_all() {
            match self.config.fault_policy {
                FaultPolicy::Log => error!(error = %err, "background flush failed"),
                FaultPolicy::Panic => {
                    let reason = err.to_string();
                    error!(error = %reason, "background flush failed, halting log");
                    self.pending.lock().halt(&reason);
                    panic!("background flush failed: {reason}");
                }
            }
        }

        if let Some(max_idle) = self.config.unload_idle {
            let unloaded = self.unload_idle(Some(max_idle));
            if unloaded > 0 {
                trace!(unloaded, "idle segments unloaded");
            }
        }
    }

    fn get(
        &self,
        key: LogId,
        include_key: bool,
        limit: usize,
    ) -> CoreResult<(Vec<Record>, bool)> {
        // Snapshot so segment loads do not hold up appenders.
        let segments = self.segments.read().clone();

        let mut lookup_hit = false;
        let start = locator::find_segment(&segments, key, |segment| {
            let hit = self.read_segment(segment, key, 1, include_key)?.1;
            lookup_hit |= hit;
            Ok(hit)
        })?;
        let Some(start) = start else {
            return Ok((Vec::new(), false));
        };

        // Past a missed lookup every record of the start segment qualifies,
        // so the summaries answer `found` without loading anything.
        if limit == 0 {
            let found = lookup_hit || segments[start..].iter().any(|s| s.count() > 0);
            return Ok((Vec::new(), found));
        }

        let mut records = Vec::new();
        let mut found = false;
        for segment in &segments[start..] {
            let (batch, hit) =
                self.read_segment(segment, key, limit - records.len(), include_key)?;
            found |= hit;
            records.extend(batch);
            if found && records.len() >= limit {
                break;
            }
        }

        Ok((records, found))
    }

    /// Loads the segment if needed and locates `key` in it, retrying if a
    /// concurrent unload slips in between.
    fn read_segment(
        &self,
        segment: &Segment,
        key: LogId,
        limit: usize,
        include_key: bool,
    ) -> CoreResult<(Vec<Record>, bool)> {
        loop {
            if !segment.is_loaded() {
                match segment.load(self.store.as_ref(), &self.config.base_path) {
                    Ok(()) | Err(CoreError::AlreadyLoaded { .. }) => {}
                    Err(err) => return Err(err),
                }
            }
            if let Some(result) = segment.try_locate(key, limit, include_key) {
                return Ok(result);
            }
        }
    }

    /// Unloads non-tail segments, all of them or only those idle longer
    /// than `max_idle`.
    fn unload_idle(&self, max_idle: Option<Duration>) -> usize {
        let segments = self.segments.read().clone();
        let Some((_tail, older)) = segments.split_last() else {
            return 0;
        };

        let mut unloaded = 0;
        for segment in older {
            if !segment.is_loaded() {
                continue;
            }
            if max_idle.is_some_and(|idle| segment.idle_for() <= idle) {
                continue;
            }
            if segment.unload() {
                unloaded += 1;
            }
        }
        unloaded
    }

    fn remove_segment(&self, id: LogId) -> CoreResult<()> {
        let segment = {
            let mut segments = self.segments.write();
            let pos = segments
                .binary_search_by_key(&id, |s| s.id())
                .map_err(|_| CoreError::invalid_operation(format!("no segment {id}")))?;
            if pos + 1 == segments.len() {
                return Err(CoreError::invalid_operation(
                    "cannot remove the tail segment",
                ));
            }
            if segments[pos].is_dirty() {
                return Err(CoreError::invalid_operation(format!(
                    "segment {id} has unflushed records"
                )));
            }
            let segment = segments.remove(pos);
            self.pending.lock().metadata_dirty = true;
            segment
        };

        self.flush_all()?;
        segment.delete(self.store.as_ref(), &self.config.base_path)?;
        debug!(segment = %id, "segment removed");
        Ok(())
    }
}

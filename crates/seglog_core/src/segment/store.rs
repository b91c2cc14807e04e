//! In-memory segment state and its persistence.

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::ids::IdSource;
use crate::metadata::SegmentSummary;
use crate::segment::record::{decode_records, encode_records, Record};
use crate::types::LogId;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use seglog_storage::FileStore;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// File name prefix of segment files; the segment id follows it.
pub const SEGMENT_FILE_PREFIX: &str = "segment_";

/// Mutable fields, guarded by the data lock.
#[derive(Debug)]
struct SegmentState {
    created_at: DateTime<Utc>,
    last_modified_at: DateTime<Utc>,
    count: usize,
    byte_size: usize,
    records: Vec<Record>,
    last_record_id: Option<LogId>,
    loaded: bool,
    dirty: bool,
}

/// A bounded, append-only run of records persisted as one file.
///
/// # Locking
///
/// Two independent locks:
/// - the **data lock** guards the fields above and is never held across I/O
/// - the **I/O lock** serializes this segment's own persist/load/delete
///
/// Appenders and readers only ever contend for the data lock, so a slow
/// disk write of one segment never blocks them. Lock order is I/O lock
/// before data lock.
///
/// # Residency
///
/// A segment is either loaded (records in memory) or unloaded (summary
/// only). Only a clean segment may be unloaded, so unpersisted records are
/// never dropped.
pub struct Segment {
    id: LogId,
    ids: Arc<dyn IdSource>,
    clock: Arc<dyn Clock>,
    state: RwLock<SegmentState>,
    io_lock: Mutex<()>,
    /// Milliseconds since the epoch of the last append/load/read.
    last_used_ms: AtomicI64,
}

fn epoch_millis(time: SystemTime) -> i64 {
    DateTime::<Utc>::from(time).timestamp_millis()
}

impl Segment {
    /// Creates a new, empty, loaded segment.
    ///
    /// The segment takes its id from `ids` before any of its records do,
    /// so its id is below every id it will contain.
    pub fn create(ids: Arc<dyn IdSource>, clock: Arc<dyn Clock>) -> Self {
        let id = ids.next();
        let now = clock.now();
        let stamp = DateTime::<Utc>::from(now);

        Self {
            id,
            ids,
            clock,
            state: RwLock::new(SegmentState {
                created_at: stamp,
                last_modified_at: stamp,
                count: 0,
                byte_size: 0,
                records: Vec::new(),
                last_record_id: None,
                loaded: true,
                dirty: false,
            }),
            io_lock: Mutex::new(()),
            last_used_ms: AtomicI64::new(epoch_millis(now)),
        }
    }

    /// Recreates an unloaded segment from its persisted summary.
    pub fn restore(summary: &SegmentSummary, ids: Arc<dyn IdSource>, clock: Arc<dyn Clock>) -> Self {
        let now = epoch_millis(clock.now());
        Self {
            id: summary.id,
            ids,
            clock,
            state: RwLock::new(SegmentState {
                created_at: summary.created_at,
                last_modified_at: summary.last_modified_at,
                count: summary.count,
                byte_size: summary.byte_size,
                records: Vec::new(),
                last_record_id: summary.last_record_id,
                loaded: false,
                dirty: false,
            }),
            io_lock: Mutex::new(()),
            last_used_ms: AtomicI64::new(now),
        }
    }

    /// Returns the segment id.
    #[must_use]
    pub fn id(&self) -> LogId {
        self.id
    }

    /// Returns the store path of this segment's file.
    #[must_use]
    pub fn path(&self, base_path: &str) -> String {
        format!("{base_path}{SEGMENT_FILE_PREFIX}{}", self.id.as_i64())
    }

    /// Returns whether the records are resident in memory.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state.read().loaded
    }

    /// Returns whether in-memory state is ahead of the file.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state.read().dirty
    }

    /// Returns the number of records.
    #[must_use]
    pub fn count(&self) -> usize {
        self.state.read().count
    }

    /// Returns the summary persisted in the log metadata.
    #[must_use]
    pub fn summary(&self) -> SegmentSummary {
        let state = self.state.read();
        SegmentSummary {
            id: self.id,
            created_at: state.created_at,
            last_modified_at: state.last_modified_at,
            count: state.count,
            byte_size: state.byte_size,
            last_record_id: state.last_record_id,
        }
    }

    /// Returns how long ago the segment was last appended to, loaded, or read.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        let now = epoch_millis(self.clock.now());
        let last = self.last_used_ms.load(Ordering::Relaxed);
        Duration::from_millis(u64::try_from(now - last).unwrap_or(0))
    }

    fn touch(&self) {
        self.last_used_ms
            .store(epoch_millis(self.clock.now()), Ordering::Relaxed);
    }

    /// Appends a record, returning its id.
    ///
    /// Capacity is not checked; see [`Segment::try_append`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Unavailable`] if the segment is not loaded.
    pub fn append(&self, payload: &[u8]) -> CoreResult<LogId> {
        let mut state = self.state.write();
        self.append_locked(&mut state, payload)
    }

    /// Appends a record if the segment can take it, atomically with the
    /// capacity check. Returns `Ok(None)` when the segment is full or
    /// unloaded, which is the caller's cue to roll over.
    pub fn try_append(
        &self,
        payload: &[u8],
        max_bytes: usize,
        max_count: usize,
        max_age: Duration,
    ) -> CoreResult<Option<LogId>> {
        let mut state = self.state.write();
        if !self.accepts(&state, payload.len(), max_bytes, max_count, max_age) {
            return Ok(None);
        }
        self.append_locked(&mut state, payload).map(Some)
    }

    fn append_locked(&self, state: &mut SegmentState, payload: &[u8]) -> CoreResult<LogId> {
        if !state.loaded {
            return Err(CoreError::unavailable(self.id));
        }

        let now = self.clock.now();
        let stamp = DateTime::<Utc>::from(now);
        let id = self.ids.next();

        state.records.push(Record::new(id, stamp, payload.to_vec()));
        state.count += 1;
        state.byte_size += payload.len();
        state.last_modified_at = stamp;
        state.last_record_id = Some(id);
        state.dirty = true;
        self.last_used_ms.store(epoch_millis(now), Ordering::Relaxed);

        Ok(id)
    }

    /// Returns whether a payload of `payload_size` bytes fits.
    ///
    /// Refuses when unloaded, when the record count or payload bytes would
    /// exceed their limits, or when the segment is older than `max_age`.
    #[must_use]
    pub fn can_accept(
        &self,
        payload_size: usize,
        max_bytes: usize,
        max_count: usize,
        max_age: Duration,
    ) -> bool {
        let state = self.state.read();
        self.accepts(&state, payload_size, max_bytes, max_count, max_age)
    }

    fn accepts(
        &self,
        state: &SegmentState,
        payload_size: usize,
        max_bytes: usize,
        max_count: usize,
        max_age: Duration,
    ) -> bool {
        if !state.loaded {
            return false;
        }
        if state.count + 1 > max_count {
            return false;
        }
        if state.byte_size + payload_size > max_bytes {
            return false;
        }

        let now = DateTime::<Utc>::from(self.clock.now());
        match now.signed_duration_since(state.created_at).to_std() {
            Ok(age) => age <= max_age,
            // Clock went backwards; the segment is not older than max_age.
            Err(_) => true,
        }
    }

    /// Writes the records to the store if they changed since the last write.
    ///
    /// The records are encoded under the data lock, which is then released
    /// before the store write. If the write fails the segment is marked
    /// dirty again and the error is returned for the caller to retry.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Unavailable`] if dirty but not loaded, or the
    /// encode/store error.
    pub fn persist(&self, store: &dyn FileStore, base_path: &str) -> CoreResult<()> {
        let _io = self.io_lock.lock();

        let encoded = {
            let mut state = self.state.write();
            if !state.dirty {
                return Ok(());
            }
            if !state.loaded {
                return Err(CoreError::unavailable(self.id));
            }
            let encoded = encode_records(&state.records)?;
            state.dirty = false;
            encoded
        };

        let path = self.path(base_path);
        if let Err(e) = store.replace(&path, &encoded) {
            self.state.write().dirty = true;
            warn!(segment = %self.id, %path, error = %e, "segment write failed");
            return Err(e.into());
        }

        Ok(())
    }

    /// Reads the records back from the store.
    ///
    /// # Errors
    ///
    /// - [`CoreError::AlreadyLoaded`] if the segment is resident
    /// - [`CoreError::NotFound`] if the file does not exist
    /// - [`CoreError::Corrupt`] if the file cannot be decoded
    pub fn load(&self, store: &dyn FileStore, base_path: &str) -> CoreResult<()> {
        let _io = self.io_lock.lock();

        if self.state.read().loaded {
            return Err(CoreError::already_loaded(self.id));
        }

        let path = self.path(base_path);
        let data = store
            .load_and_repair(&path)?
            .ok_or_else(|| CoreError::not_found(path.clone()))?;
        let records = decode_records(&path, &data)?;

        let mut state = self.state.write();
        state.count = records.len();
        state.byte_size = records.iter().map(|r| r.payload.len()).sum();
        state.last_record_id = records.last().map(|r| r.id);
        state.records = records;
        state.loaded = true;
        state.dirty = false;
        drop(state);

        self.touch();
        debug!(segment = %self.id, "segment loaded");
        Ok(())
    }

    /// Drops the records from memory if they are safely on disk.
    ///
    /// Returns `true` if the segment was unloaded. Dirty segments, already
    /// unloaded segments, and segments with a persist in flight are left
    /// untouched.
    pub fn unload(&self) -> bool {
        let Some(_io) = self.io_lock.try_lock() else {
            return false;
        };

        let mut state = self.state.write();
        if !state.loaded || state.dirty {
            return false;
        }
        state.records = Vec::new();
        state.loaded = false;
        drop(state);

        debug!(segment = %self.id, "segment unloaded");
        true
    }

    /// Removes the segment file from the store. Missing files are fine.
    ///
    /// # Errors
    ///
    /// Returns the store error if the existence check or removal fails.
    pub fn delete(&self, store: &dyn FileStore, base_path: &str) -> CoreResult<()> {
        let _io = self.io_lock.lock();

        let path = self.path(base_path);
        if !store.exists(&path)? {
            return Ok(());
        }
        store.remove(&path)?;
        debug!(segment = %self.id, %path, "segment file removed");
        Ok(())
    }

    /// Returns up to `limit` consecutive records starting at the first
    /// record with id `> key` (`>= key` when `include_key`).
    ///
    /// `found` is `false` when no record in this segment qualifies,
    /// including when the segment is not loaded.
    #[must_use]
    pub fn locate(&self, key: LogId, limit: usize, include_key: bool) -> (Vec<Record>, bool) {
        self.try_locate(key, limit, include_key)
            .unwrap_or_else(|| (Vec::new(), false))
    }

    /// Like [`Segment::locate`], but distinguishes "not loaded" (`None`)
    /// from "loaded, no match".
    pub(crate) fn try_locate(
        &self,
        key: LogId,
        limit: usize,
        include_key: bool,
    ) -> Option<(Vec<Record>, bool)> {
        let state = self.state.read();
        if !state.loaded {
            return None;
        }

        let start = state.records.partition_point(|r| {
            if include_key {
                r.id < key
            } else {
                r.id <= key
            }
        });
        if start == state.records.len() {
            return Some((Vec::new(), false));
        }

        let end = start.saturating_add(limit).min(state.records.len());
        let records = state.records[start..end].to_vec();
        drop(state);

        self.touch();
        Some((records, true))
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("count", &state.count)
            .field("byte_size", &state.byte_size)
            .field("loaded", &state.loaded)
            .field("dirty", &state.dirty)
            .finish_non_exhaustive()
    }
}

//! Log configuration.

use std::time::Duration;

/// When appends are made durable relative to `append` returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    /// Flush the segment (and metadata, if changed) before returning.
    Immediate,
    /// Queue the flush for the background cycle and return at once.
    Background,
    /// Queue the flush for the background cycle and block until it lands.
    ///
    /// Concurrent appenders share one write per segment per cycle.
    #[default]
    BackgroundWait,
}

/// What the background flusher does with a failure nobody is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultPolicy {
    /// Log the failure and retry next cycle.
    #[default]
    Log,
    /// Halt the log and panic the background flush thread.
    ///
    /// Callers waiting on a flush get [`CoreError::FlushAbandoned`], and
    /// so does every later append. Reads keep working.
    ///
    /// [`CoreError::FlushAbandoned`]: crate::CoreError::FlushAbandoned
    Panic,
}

/// Configuration for opening a log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Store path prefix for this log's files, e.g. `"orders/"`.
    ///
    /// Segment files live at `base_path + "segment_" + id`.
    pub base_path: String,

    /// Maximum payload bytes per segment before rolling over.
    pub max_segment_bytes: usize,

    /// Maximum records per segment before rolling over.
    pub max_segment_records: usize,

    /// Maximum age of a segment before it stops accepting records.
    pub max_segment_age: Duration,

    /// Durability mode for appends.
    pub durability: Durability,

    /// Sleep between background flush cycles.
    pub flush_interval: Duration,

    /// Handling of unobserved background flush failures.
    pub fault_policy: FaultPolicy,

    /// Unload clean, non-tail segments idle for longer than this
    /// (checked every background cycle). `None` keeps them resident.
    pub unload_idle: Option<Duration>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            max_segment_bytes: 1_000_000,
            max_segment_records: 10_000,
            max_segment_age: Duration::from_secs(10 * 60),
            durability: Durability::BackgroundWait,
            flush_interval: Duration::from_millis(300),
            fault_policy: FaultPolicy::Log,
            unload_idle: None,
        }
    }
}

impl LogConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the store path prefix.
    #[must_use]
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Sets the maximum payload bytes per segment.
    #[must_use]
    pub const fn max_segment_bytes(mut self, bytes: usize) -> Self {
        self.max_segment_bytes = bytes;
        self
    }

    /// Sets the maximum records per segment.
    #[must_use]
    pub const fn max_segment_records(mut self, records: usize) -> Self {
        self.max_segment_records = records;
        self
    }

    /// Sets the maximum segment age.
    #[must_use]
    pub const fn max_segment_age(mut self, age: Duration) -> Self {
        self.max_segment_age = age;
        self
    }

    /// Sets the durability mode.
    #[must_use]
    pub const fn durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    /// Sets the background flush interval.
    #[must_use]
    pub const fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the background fault policy.
    #[must_use]
    pub const fn fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }

    /// Enables idle unloading.
    #[must_use]
    pub const fn unload_idle(mut self, idle: Option<Duration>) -> Self {
        self.unload_idle = idle;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LogConfig::default();
        assert_eq!(config.durability, Durability::BackgroundWait);
        assert_eq!(config.max_segment_records, 10_000);
        assert!(config.base_path.is_empty());
        assert!(config.unload_idle.is_none());
    }

    #[test]
    fn builder_pattern() {
        let config = LogConfig::new()
            .base_path("q/")
            .max_segment_records(2)
            .durability(Durability::Immediate)
            .flush_interval(Duration::from_millis(5));

        assert_eq!(config.base_path, "q/");
        assert_eq!(config.max_segment_records, 2);
        assert_eq!(config.durability, Durability::Immediate);
        assert_eq!(config.flush_interval, Duration::from_millis(5));
    }
}

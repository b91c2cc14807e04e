//! Background flush thread.

use super::LogInner;
use crate::error::{CoreError, CoreResult};
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::trace;

/// Handle to the thread that runs the periodic flush cycle.
///
/// The thread lives exactly as long as the log: it is spawned on open and
/// joined by [`BackgroundFlusher::stop`], after one final flush.
#[derive(Debug)]
pub(crate) struct BackgroundFlusher {
    stop: Sender<()>,
    handle: JoinHandle<CoreResult<()>>,
}

impl BackgroundFlusher {
    /// Spawns the flush thread.
    pub(crate) fn spawn(inner: Arc<LogInner>) -> io::Result<Self> {
        let (stop, stopped) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("seglog-flush".to_string())
            .spawn(move || {
                let interval = inner.config.flush_interval;
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => inner.background_cycle(),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                trace!("flush thread stopping, final flush");
                inner.flush_all()
            })?;

        Ok(Self { stop, handle })
    }

    /// Signals the thread, waits for it, and returns the final flush result.
    pub(crate) fn stop(self) -> CoreResult<()> {
        let _ = self.stop.send(());
        self.handle
            .join()
            .unwrap_or_else(|_| Err(CoreError::invalid_operation("flush thread panicked")))
    }
}

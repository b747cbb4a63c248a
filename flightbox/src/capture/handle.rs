//! Future-like handle to a running capture

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use super::pipe::ArchiveStream;
use crate::domain::{CaptureError, Result};

/// Resolves once with the capture's archive stream or its error
///
/// Dropping the handle abandons the capture: the worker still runs to the
/// end, but its result is discarded and no bytes are streamed.
pub struct CaptureHandle {
    rx: Receiver<Result<ArchiveStream>>,
    ready: Option<Result<ArchiveStream>>,
}

impl CaptureHandle {
    pub(crate) fn new(rx: Receiver<Result<ArchiveStream>>) -> Self {
        Self { rx, ready: None }
    }

    /// Block until the capture finishes
    ///
    /// # Errors
    /// Returns the capture's error, or [`CaptureError::WorkerLost`] if the
    /// worker went away without a result
    pub fn wait(mut self) -> Result<ArchiveStream> {
        match self.ready.take() {
            Some(result) => result,
            None => self.rx.recv().unwrap_or(Err(CaptureError::WorkerLost)),
        }
    }

    /// Block for at most `timeout`
    ///
    /// Returns `None` if the capture is still running; the handle can be
    /// waited on again.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<ArchiveStream>> {
        if let Some(result) = self.ready.take() {
            return Some(result);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(CaptureError::WorkerLost)),
        }
    }

    /// Whether [`wait`](Self::wait) would return without blocking
    pub fn is_ready(&mut self) -> bool {
        if self.ready.is_none() {
            self.ready = match self.rx.try_recv() {
                Ok(result) => Some(result),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(Err(CaptureError::WorkerLost)),
            };
        }
        self.ready.is_some()
    }
}

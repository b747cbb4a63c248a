//! Recording backend seam
//!
//! The capture pipeline only talks to the recording subsystem through these
//! traits. [`SamplingBackend`](super::SamplingBackend) is the in-process
//! implementation; tests substitute scripted fakes.

use std::path::Path;

use flightbox_common::RecordedEvent;

use super::RecordingConfiguration;
use crate::domain::Result;

/// Low-overhead recording subsystem
pub trait RecordingBackend: Send + Sync {
    /// Resolve a configuration by name
    ///
    /// # Errors
    /// Returns [`CaptureError::ConfigurationNotFound`](crate::domain::CaptureError::ConfigurationNotFound)
    /// if the name is unknown
    fn resolve_configuration(&self, name: &str) -> Result<RecordingConfiguration>;

    /// Start recording immediately with the given configuration
    ///
    /// # Errors
    /// Returns an error if the recording subsystem cannot start a session
    fn begin(&self, configuration: &RecordingConfiguration) -> Result<Box<dyn RecordingSession>>;

    /// Open a persisted recording for sequential reading
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or is not a recording
    fn open_for_read(&self, path: &Path) -> Result<Box<dyn EventReader>>;
}

/// An active recording, `Started` until consumed by [`stop_and_persist`](Self::stop_and_persist)
pub trait RecordingSession {
    /// Configuration this session was started with
    fn configuration(&self) -> &RecordingConfiguration;

    /// Stop the session and persist everything it captured to `path`
    ///
    /// Blocks until the file is fully written. The session is consumed, so a
    /// stopped session cannot be restarted.
    ///
    /// # Errors
    /// Returns an error if the path cannot be written
    fn stop_and_persist(self: Box<Self>, path: &Path) -> Result<()>;
}

/// Single-pass reader over the events of a persisted recording
///
/// Dropping the reader releases the underlying file.
pub trait EventReader {
    /// Next event, or `None` once the recording is exhausted
    ///
    /// # Errors
    /// Returns an error if the underlying file cannot be read or an event
    /// cannot be parsed
    fn next_event(&mut self) -> Result<Option<RecordedEvent>>;
}

/// Adapter turning any [`EventReader`] into an iterator
pub struct Events<R: EventReader + ?Sized> {
    reader: Box<R>,
}

impl<R: EventReader + ?Sized> Events<R> {
    pub fn new(reader: Box<R>) -> Self {
        Self { reader }
    }
}

impl<R: EventReader + ?Sized> Iterator for Events<R> {
    type Item = Result<RecordedEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_event().transpose()
    }
}

//! Recording windows
//!
//! [`record`] is the policy layer on top of a [`RecordingBackend`]: it turns a
//! configuration name and an optional duration into one blocking capture window.

use std::path::Path;
use std::time::Duration;

use log::{debug, info};

use super::backend::{RecordingBackend, RecordingSession};
use crate::domain::Result;

/// Resolve a configuration by name and start a session with it
///
/// # Errors
/// Returns [`CaptureError::ConfigurationNotFound`](crate::domain::CaptureError::ConfigurationNotFound)
/// for unknown names, or any error the backend raises while starting
pub fn start(backend: &dyn RecordingBackend, configuration_name: &str) -> Result<Box<dyn RecordingSession>> {
    let configuration = backend.resolve_configuration(configuration_name)?;
    backend.begin(&configuration)
}

/// Record one window of `duration` into `path`
///
/// A `None` or zero duration skips the window entirely: nothing is resolved,
/// started or written, so `path` keeps whatever placeholder it had. Returns
/// whether a recording was made.
///
/// The calling thread sleeps for the whole window.
///
/// # Errors
/// Returns an error if the configuration is unknown, the session cannot be
/// started, or the recording cannot be persisted
pub fn record(
    backend: &dyn RecordingBackend,
    configuration_name: &str,
    duration: Option<Duration>,
    path: &Path,
) -> Result<bool> {
    let Some(duration) = duration.filter(|d| !d.is_zero()) else {
        debug!("Skipping \"{configuration_name}\" recording window (no duration)");
        return Ok(false);
    };

    let session = start(backend, configuration_name)?;
    info!("Recording \"{configuration_name}\" for {duration:?}");
    std::thread::sleep(duration);
    session.stop_and_persist(path)?;

    Ok(true)
}

//! Capture orchestration
//!
//! A capture runs on its own worker thread so the caller is never blocked:
//!
//! ```text
//! caller                 flightbox-capture                     flightbox-pipe
//!   │ capture_async()          │
//!   ├─────────────────────────▶│ validate prefix, create temp files
//!   │ ◀── CaptureHandle        │ record "profile" window
//!   │                          │ record "default" window
//!   │                          │ task dump (optional)
//!   │                          │ fold profile stacks
//!   │                          │ assemble zip, delete temp files
//!   │ ◀── Ok(ArchiveStream) ───┤ resolve handle
//!   │                          └──────────────────────────────────▶│
//!   │ read() ◀═══════════════ bounded pipe ═══════════════════════ │ write archive
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use log::{debug, info, warn};
use tempfile::NamedTempFile;

use flightbox_common::RECORDING_EXTENSION;

use super::handle::CaptureHandle;
use super::pipe::{pipe, ArchiveStream, PipeWriter};
use super::request::CaptureRequest;
use crate::analysis;
use crate::domain::{FilenamePrefix, Result};
use crate::export::archive;
use crate::recording::{
    self, RecordingBackend, RecordingSession, SamplingBackend, DEFAULT_CONFIGURATION, PROFILE_CONFIGURATION,
};
use crate::tasks::{capture_task_dump, GlobalTasks, TaskIntrospection};

/// Chunks the archive pipe holds in flight by default
pub const DEFAULT_PIPE_CAPACITY: usize = 16;

/// Entry point for captures
///
/// Cheap to clone; clones share the backend and introspection facility.
#[derive(Clone)]
pub struct FlightRecorder {
    backend: Arc<dyn RecordingBackend>,
    introspection: Arc<dyn TaskIntrospection>,
    temp_dir: Option<PathBuf>,
    pipe_capacity: usize,
}

impl Default for FlightRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl FlightRecorder {
    /// Recorder sampling this process and dumping the global task registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: Arc::new(SamplingBackend::default()),
            introspection: Arc::new(GlobalTasks),
            temp_dir: None,
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn RecordingBackend>) -> Self {
        self.backend = backend;
        self
    }

    #[must_use]
    pub fn with_introspection(mut self, introspection: Arc<dyn TaskIntrospection>) -> Self {
        self.introspection = introspection;
        self
    }

    /// Directory for temporary recording files (default: the system temp dir)
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Chunks the archive pipe holds before the feeder blocks
    #[must_use]
    pub fn with_pipe_capacity(mut self, capacity: usize) -> Self {
        self.pipe_capacity = capacity;
        self
    }

    /// Start a capture in the background
    ///
    /// Returns immediately. Every failure, including an invalid prefix, is
    /// reported through the handle.
    #[must_use]
    pub fn capture_async(&self, request: CaptureRequest) -> CaptureHandle {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let recorder = self.clone();

        let spawned = thread::Builder::new().name("flightbox-capture".to_string()).spawn(move || {
            let result = recorder.capture(&request).map(|archive| {
                let (writer, reader) = pipe(recorder.pipe_capacity);
                (ArchiveStream::new(reader, archive.len()), writer, archive)
            });

            match result {
                Ok((stream, writer, archive)) => {
                    if tx.send(Ok(stream)).is_err() {
                        debug!("Capture handle dropped, discarding archive");
                        return;
                    }
                    spawn_feeder(writer, archive);
                }
                Err(e) => {
                    warn!("Capture failed: {e}");
                    let _ = tx.send(Err(e));
                }
            }
        });

        // The closure, and the sender with it, is dropped on failure, so the
        // handle resolves to WorkerLost
        if let Err(e) = spawned {
            warn!("Failed to spawn capture worker: {e}");
        }
        CaptureHandle::new(rx)
    }

    /// Start a session with a named configuration
    ///
    /// # Errors
    /// Returns an error if the configuration is unknown or the session cannot start
    pub fn start_recording(&self, configuration_name: &str) -> Result<Box<dyn RecordingSession>> {
        recording::start(self.backend.as_ref(), configuration_name)
    }

    /// Folded stacks of a persisted recording
    ///
    /// # Errors
    /// Returns an error if the recording cannot be opened or parsed
    pub fn stacks_from_recording(&self, recording: &Path) -> Result<Vec<u8>> {
        analysis::stacks_from_recording(self.backend.as_ref(), recording)
    }

    /// The capture sequence, run on the worker thread
    fn capture(&self, request: &CaptureRequest) -> Result<Vec<u8>> {
        let prefix = FilenamePrefix::new(request.filename_prefix.as_str())?;
        info!(
            "Capture \"{prefix}\" started (profile: {:?}, default: {:?}, task dump: {})",
            request.profile_duration, request.default_duration, request.include_task_dump
        );

        let profile_file = self.temp_file(&prefix, PROFILE_CONFIGURATION)?;
        let default_file = self.temp_file(&prefix, DEFAULT_CONFIGURATION)?;

        let backend = self.backend.as_ref();
        let profiled =
            recording::record(backend, PROFILE_CONFIGURATION, request.profile_duration, profile_file.path())?;
        recording::record(backend, DEFAULT_CONFIGURATION, request.default_duration, default_file.path())?;

        let task_dump = request.include_task_dump.then(|| capture_task_dump(self.introspection.as_ref()));

        let stacks = if profiled {
            analysis::stacks_from_recording(backend, profile_file.path())?
        } else {
            Vec::new()
        };

        let archive =
            archive::assemble(&prefix, profile_file.path(), default_file.path(), &stacks, task_dump.as_deref())?;

        remove_temp_file(profile_file);
        remove_temp_file(default_file);

        info!("Capture \"{prefix}\" finished: {} byte archive", archive.len());
        Ok(archive)
    }

    fn temp_file(&self, prefix: &FilenamePrefix, configuration: &str) -> Result<NamedTempFile> {
        let name_prefix = format!("{prefix}-{configuration}-");
        let suffix = format!(".{RECORDING_EXTENSION}");
        let mut builder = tempfile::Builder::new();
        builder.prefix(&name_prefix).suffix(&suffix);

        let file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file)
    }
}

/// Delete a temp file now, reporting failures instead of ignoring them on drop
fn remove_temp_file(file: NamedTempFile) {
    let path = file.path().to_path_buf();
    if let Err(e) = file.close() {
        warn!("Failed to delete temporary recording {}: {e}", path.display());
    }
}

fn spawn_feeder(writer: PipeWriter, archive: Vec<u8>) {
    let spawned = thread::Builder::new().name("flightbox-pipe".to_string()).spawn(move || {
        if let Err(e) = feed(writer, &archive) {
            debug!("Archive stream reader hung up: {e}");
        }
    });
    // The writer is dropped with the closure, so the reader sees StreamClosedEarly
    if let Err(e) = spawned {
        warn!("Failed to spawn archive feeder: {e}");
    }
}

fn feed(mut writer: PipeWriter, archive: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    writer.write_all(archive)?;
    writer.finish()
}

/// Capture with a default [`FlightRecorder`]
///
/// Records `profile_duration` with the `profile` configuration, then
/// `default_duration` with the `default` configuration, and streams back a
/// zip archive whose entries live under `filename_prefix/`.
#[must_use]
pub fn capture_async(
    profile_duration: Option<std::time::Duration>,
    default_duration: Option<std::time::Duration>,
    filename_prefix: impl Into<String>,
    include_task_dump: bool,
) -> CaptureHandle {
    FlightRecorder::new().capture_async(
        CaptureRequest::new()
            .profile_duration(profile_duration)
            .default_duration(default_duration)
            .filename_prefix(filename_prefix)
            .include_task_dump(include_task_dump),
    )
}

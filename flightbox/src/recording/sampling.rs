//! In-process sampling backend
//!
//! Execution samples come from `pprof`'s SIGPROF sampler, which interrupts
//! running threads at the configured frequency and unwinds their stacks.
//! Process statistics come from a [`StatsPoller`] thread. Both are started
//! by [`RecordingBackend::begin`] and stopped by
//! [`RecordingSession::stop_and_persist`], which writes a recording file.
//!
//! ## Session gate
//!
//! The SIGPROF sampler is process-global: only one profiler can run at a
//! time. Every [`SamplingSession`] holds a process-wide gate for its whole
//! lifetime, so sessions from concurrent captures run one after another
//! instead of failing or observing each other's samples.
//!
//! The gate remembers which thread holds it. Beginning a second session on
//! that same thread would wait on itself forever, so it fails with
//! [`CaptureError::SamplerUnavailable`] instead.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use log::{debug, info};
use pprof::{ProfilerGuard, ProfilerGuardBuilder};

use flightbox_common::{RecordedEvent, RecordedFrame, RecordingHeader};

use super::backend::{EventReader, RecordingBackend, RecordingSession};
use super::file::{RecordingFileReader, RecordingWriter};
use super::frames::{demangle_symbol, recorded_frame};
use super::process_stats::StatsPoller;
use super::{now_ms, RecordingConfiguration};
use crate::classification::diagnostics;
use crate::domain::{CaptureError, Result};

/// Held by the active session; see the module docs
static SESSION_GATE: Mutex<()> = Mutex::new(());

/// Thread currently holding [`SESSION_GATE`]
static GATE_OWNER: Mutex<Option<ThreadId>> = Mutex::new(None);

fn gate_owner() -> MutexGuard<'static, Option<ThreadId>> {
    GATE_OWNER.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ownership of the session gate, released on drop
struct GateHold {
    _guard: MutexGuard<'static, ()>,
}

impl GateHold {
    fn acquire() -> Result<Self> {
        let current = thread::current().id();
        // Only the holder ever writes its own ID, so this check cannot race
        if *gate_owner() == Some(current) {
            return Err(CaptureError::SamplerUnavailable(
                "a session is already active on this thread".to_string(),
            ));
        }

        let guard = SESSION_GATE.lock().unwrap_or_else(PoisonError::into_inner);
        *gate_owner() = Some(current);
        Ok(Self { _guard: guard })
    }
}

impl Drop for GateHold {
    fn drop(&mut self) {
        // Runs before the guard field is dropped, while the gate is still held
        *gate_owner() = None;
    }
}

/// Recording backend sampling the current process
#[derive(Debug, Clone)]
pub struct SamplingBackend {
    configurations: HashMap<String, RecordingConfiguration>,
}

impl Default for SamplingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplingBackend {
    /// Backend with the built-in `profile` and `default` configurations
    #[must_use]
    pub fn new() -> Self {
        let configurations = RecordingConfiguration::builtins()
            .into_iter()
            .map(|configuration| (configuration.name.clone(), configuration))
            .collect();
        Self { configurations }
    }

    /// Register a configuration, replacing any existing one with the same name
    #[must_use]
    pub fn with_configuration(mut self, configuration: RecordingConfiguration) -> Self {
        self.configurations.insert(configuration.name.clone(), configuration);
        self
    }

    /// Register every configuration found in a JSON file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load_configurations(self, path: impl AsRef<Path>) -> Result<Self> {
        let loaded = RecordingConfiguration::load_file(path)?;
        Ok(loaded.into_iter().fold(self, Self::with_configuration))
    }

    /// Names of all registered configurations, sorted
    #[must_use]
    pub fn configuration_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.configurations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl RecordingBackend for SamplingBackend {
    fn resolve_configuration(&self, name: &str) -> Result<RecordingConfiguration> {
        self.configurations
            .get(name)
            .cloned()
            .ok_or_else(|| CaptureError::ConfigurationNotFound(name.to_string()))
    }

    fn begin(&self, configuration: &RecordingConfiguration) -> Result<Box<dyn RecordingSession>> {
        Ok(Box::new(SamplingSession::start(configuration.clone())?))
    }

    fn open_for_read(&self, path: &Path) -> Result<Box<dyn EventReader>> {
        Ok(Box::new(RecordingFileReader::open(path)?))
    }
}

/// A running sampler plus statistics poller
pub struct SamplingSession {
    configuration: RecordingConfiguration,
    profiler: Option<ProfilerGuard<'static>>,
    stats: Option<StatsPoller>,
    started_at: Instant,
    start_time_ms: u64,
    // Declared last so it is released after the sampler stops
    gate: GateHold,
}

impl SamplingSession {
    /// Wait for the session gate, then start sampling
    ///
    /// # Errors
    /// Returns [`CaptureError::SamplerUnavailable`] if this thread already
    /// runs a session or the profiler cannot be started, or an I/O error if
    /// the statistics thread cannot be spawned
    pub fn start(configuration: RecordingConfiguration) -> Result<Self> {
        let gate = GateHold::acquire()?;

        let profiler = configuration
            .execution_sample_hz
            .map(|hz| {
                ProfilerGuardBuilder::default()
                    .frequency(i32::try_from(hz).unwrap_or(i32::MAX))
                    .blocklist(&configuration.blocklist)
                    .build()
            })
            .transpose()
            .map_err(|e| CaptureError::SamplerUnavailable(e.to_string()))?;

        let stats = configuration
            .process_stats_interval_ms
            .map(|ms| StatsPoller::start(Duration::from_millis(ms)))
            .transpose()?;

        debug!(
            "Started \"{}\" session (samples: {:?} Hz, stats every {:?} ms)",
            configuration.name, configuration.execution_sample_hz, configuration.process_stats_interval_ms
        );

        Ok(Self {
            configuration,
            profiler,
            stats,
            started_at: Instant::now(),
            start_time_ms: now_ms(),
            gate,
        })
    }
}

impl RecordingSession for SamplingSession {
    fn configuration(&self) -> &RecordingConfiguration {
        &self.configuration
    }

    fn stop_and_persist(self: Box<Self>, path: &Path) -> Result<()> {
        let SamplingSession { configuration, profiler, stats, started_at, start_time_ms, gate } = *self;
        let stop_time_ms = now_ms();
        let duration_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);

        let mut events = match &profiler {
            Some(guard) => collect_samples(guard, stop_time_ms)?,
            None => Vec::new(),
        };
        // Dropping the guard stops the SIGPROF timer
        drop(profiler);

        if let Some(poller) = stats {
            events.extend(poller.stop());
        }
        events.sort_by_key(|event| event.timestamp_ms);

        let header = RecordingHeader::new(&configuration.name, start_time_ms, duration_ms);
        let mut writer = RecordingWriter::create(path, &header)?;
        for event in &events {
            writer.write_event(event)?;
        }
        let written = writer.events_written();
        writer.finish()?;
        drop(gate);

        diagnostics().log_coverage();
        info!(
            "Persisted \"{}\" recording: {written} events over {duration_ms} ms to {}",
            configuration.name,
            path.display()
        );
        Ok(())
    }
}

/// Expand the sampler's aggregated report into one event per sample
fn collect_samples(guard: &ProfilerGuard<'static>, timestamp_ms: u64) -> Result<Vec<RecordedEvent>> {
    let report = guard.report().build().map_err(|e| CaptureError::SamplerUnavailable(e.to_string()))?;

    let mut events = Vec::new();
    for (frames, count) in &report.data {
        // Symbols of one address are listed innermost inline frame first,
        // and addresses leaf first, so flattening keeps leaf-first order
        let stack: Vec<RecordedFrame> = frames.frames.iter().flatten().map(symbol_frame).collect();
        let samples = usize::try_from(*count).unwrap_or(0);

        let event =
            RecordedEvent::execution_sample(timestamp_ms, stack).with_thread(frames.thread_name.clone());
        events.extend(std::iter::repeat(event).take(samples));
    }
    Ok(events)
}

fn symbol_frame(symbol: &pprof::Symbol) -> RecordedFrame {
    let function = symbol
        .name
        .as_deref()
        .and_then(|raw| std::str::from_utf8(raw).ok())
        .map_or_else(|| "Unknown".to_string(), demangle_symbol);
    let file = symbol.filename.as_ref().map(|p| p.to_string_lossy().into_owned());

    recorded_frame(&function, file.as_deref(), symbol.lineno)
}

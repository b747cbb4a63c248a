//! Recording subsystem
//!
//! This module contains everything between "start a named configuration" and
//! "read the recorded events back":
//! - Backend traits (the seam the capture pipeline talks to)
//! - Named configurations (built-in and JSON-loaded)
//! - The in-process sampling backend (`pprof` + `/proc/self` statistics)
//! - The recording file format reader and writer
//! - Recording windows (start, sleep, stop and persist)

pub mod backend;
pub mod configuration;
pub mod file;
pub mod frames;
pub mod process_stats;
pub mod sampling;
pub mod session;

use std::time::{SystemTime, UNIX_EPOCH};

// Re-export common types
pub use backend::{EventReader, Events, RecordingBackend, RecordingSession};
pub use configuration::{RecordingConfiguration, DEFAULT_CONFIGURATION, PROFILE_CONFIGURATION};
pub use file::{RecordingFileReader, RecordingWriter};
pub use sampling::{SamplingBackend, SamplingSession};
pub use session::{record, start};

/// Milliseconds since the Unix epoch
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

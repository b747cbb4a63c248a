//! # Shared Recording Schema (Writers ↔ Readers)
//!
//! Defines the on-disk recording format shared between the components that
//! persist recordings (the sampling backend, test fakes) and the components
//! that read them back (the stack folder, external tooling).
//!
//! ## File Layout
//!
//! A recording file is UTF-8 JSON lines:
//!
//! ```text
//! {"format":"flightbox-recording","version":1,"configuration":"profile",...}   <- header
//! {"event_type":"flightbox.ExecutionSample","timestamp_ms":...,"stack":[...]}  <- event
//! {"event_type":"flightbox.ProcessStatistics","timestamp_ms":...,"fields":{..}} <- event
//! ```
//!
//! ## Key Types
//!
//! - [`RecordingHeader`] - First line of every recording file
//! - [`RecordedEvent`] - One observation (stack sample, statistics snapshot)
//! - [`RecordedFrame`] - One stack entry, leaf-first within an event
//! - [`FrameKind`] - Managed (Rust) vs native frame

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Format Constants
// ============================================================================

/// Value of the `format` field in every recording header
pub const RECORDING_FORMAT: &str = "flightbox-recording";

/// Current recording format version
///
/// Readers reject headers with a different version.
pub const RECORDING_FORMAT_VERSION: u32 = 1;

/// File extension used for persisted recordings (without the dot)
pub const RECORDING_EXTENSION: &str = "fbr";

// ============================================================================
// Event Type Constants
// ============================================================================

/// **Sampling Profiler**: Periodic stack sample of a running thread
///
/// Emitted by: the sampling backend, one event per sample
/// Stack: always present, leaf-first
pub const EXECUTION_SAMPLE: &str = "flightbox.ExecutionSample";

/// **Process Diagnostics**: Snapshot of process-level statistics
///
/// Emitted by: the statistics poller at session start, periodically, and at stop
/// Fields: `threads`, `rss_kib`, `cpu_time_ms`
pub const PROCESS_STATISTICS: &str = "flightbox.ProcessStatistics";

// ============================================================================
// Shared Data Structures
// ============================================================================

/// Header line of a recording file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingHeader {
    /// Always [`RECORDING_FORMAT`]
    pub format: String,
    /// Always [`RECORDING_FORMAT_VERSION`] for files written by this crate
    pub version: u32,
    /// Name of the configuration the session was started with
    pub configuration: String,
    /// Session start, milliseconds since the Unix epoch
    pub start_time_ms: u64,
    /// Wall-clock length of the session in milliseconds
    pub duration_ms: u64,
}

impl RecordingHeader {
    /// Create a header for the current format version
    #[must_use]
    pub fn new(configuration: impl Into<String>, start_time_ms: u64, duration_ms: u64) -> Self {
        Self {
            format: RECORDING_FORMAT.to_string(),
            version: RECORDING_FORMAT_VERSION,
            configuration: configuration.into(),
            start_time_ms,
            duration_ms,
        }
    }

    /// Returns true if this header describes a file this crate can read
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.format == RECORDING_FORMAT && self.version == RECORDING_FORMAT_VERSION
    }
}

/// Whether a frame belongs to Rust code or to native/foreign code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// Rust code (resolved to a Rust path or a `.rs` source file)
    Managed,
    /// Unresolved addresses, C/system symbols, sampler internals
    Native,
}

/// One stack entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordedFrame {
    /// Declaring type or module path (e.g. `myapp::worker::Pool`), may be empty
    pub type_name: String,
    /// Member name (e.g. `run`)
    pub method: String,
    pub kind: FrameKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl RecordedFrame {
    /// Create a managed frame without source location
    #[must_use]
    pub fn managed(type_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            method: method.into(),
            kind: FrameKind::Managed,
            file: None,
            line: None,
        }
    }

    /// Create a native frame without source location
    #[must_use]
    pub fn native(method: impl Into<String>) -> Self {
        Self {
            type_name: String::new(),
            method: method.into(),
            kind: FrameKind::Native,
            file: None,
            line: None,
        }
    }

    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.kind == FrameKind::Managed
    }

    /// Identifier used in folded stacks: `type::member`, or `member` when the
    /// frame has no declaring type
    #[must_use]
    pub fn identifier(&self) -> String {
        if self.type_name.is_empty() {
            self.method.clone()
        } else {
            format!("{}::{}", self.type_name, self.method)
        }
    }
}

/// One observation read from (or written to) a recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Event type name, e.g. [`EXECUTION_SAMPLE`]
    pub event_type: String,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    /// Name of the sampled thread, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    /// Captured stack, innermost frame first
    ///
    /// `None` means the event carries no stack at all, which is different from
    /// an empty stack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<RecordedFrame>>,
    /// Event payload
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl RecordedEvent {
    /// Create an event with no stack and no payload
    #[must_use]
    pub fn new(event_type: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp_ms,
            thread: None,
            stack: None,
            fields: BTreeMap::new(),
        }
    }

    /// Create an execution sample with a leaf-first stack
    #[must_use]
    pub fn execution_sample(timestamp_ms: u64, stack: Vec<RecordedFrame>) -> Self {
        Self { stack: Some(stack), ..Self::new(EXECUTION_SAMPLE, timestamp_ms) }
    }

    #[must_use]
    pub fn with_thread(mut self, thread: impl Into<String>) -> Self {
        self.thread = Some(thread.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Case-insensitive event type comparison
    #[must_use]
    pub fn is_type(&self, event_type: &str) -> bool {
        self.event_type.eq_ignore_ascii_case(event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_identifier() {
        let frame = RecordedFrame::managed("myapp::worker::Pool", "run");
        assert_eq!(frame.identifier(), "myapp::worker::Pool::run");

        let bare = RecordedFrame::managed("", "main");
        assert_eq!(bare.identifier(), "main");
    }

    #[test]
    fn test_event_type_is_case_insensitive() {
        let event = RecordedEvent::new("FLIGHTBOX.executionsample", 0);
        assert!(event.is_type(EXECUTION_SAMPLE));
        assert!(!event.is_type(PROCESS_STATISTICS));
    }

    #[test]
    fn test_absent_stack_is_omitted_from_json() {
        let event = RecordedEvent::new(PROCESS_STATISTICS, 42).with_field("threads", 3);
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("stack"));

        let parsed: RecordedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.stack, None);
        assert_eq!(parsed.fields["threads"], 3);
    }

    #[test]
    fn test_header_support_check() {
        let header = RecordingHeader::new("profile", 0, 1000);
        assert!(header.is_supported());

        let foreign = RecordingHeader { version: 99, ..header };
        assert!(!foreign.is_supported());
    }
}

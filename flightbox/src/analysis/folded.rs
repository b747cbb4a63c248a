//! Folded stack aggregation for flame graphs.
//!
//! Reduces the execution samples of a recording into the "folded" text
//! format understood by flame graph tools (`flamegraph.pl`, inferno,
//! speedscope):
//!
//! ```text
//! myapp::main;myapp::worker::run;myapp::crypto::encrypt 42
//! myapp::main;myapp::worker::run 7
//! ```
//!
//! # Data Flow
//!
//! ```text
//! recording file
//!     │  EventReader::next_event()        ← one event at a time
//!     ▼
//! filter: event type == ExecutionSample   ← case-insensitive
//!     │
//!     ▼
//! folded_trace(): managed frames only, leaf-first → root-first, joined by ';'
//!     │
//!     ▼
//! TraceCounts::record()                   ← O(1) amortized
//! ```

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use flightbox_common::{RecordedEvent, RecordedFrame, EXECUTION_SAMPLE};

use crate::domain::Result;
use crate::recording::{Events, RecordingBackend};

/// Folded trace → sample count, iterated in order of first occurrence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceCounts {
    /// Entries in first-occurrence order
    entries: Vec<(String, u64)>,
    /// Trace → index into `entries`
    index: HashMap<String, usize>,
}

impl TraceCounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `trace`
    pub fn record(&mut self, trace: String) {
        if let Some(&idx) = self.index.get(&trace) {
            self.entries[idx].1 += 1;
        } else {
            self.index.insert(trace.clone(), self.entries.len());
            self.entries.push((trace, 1));
        }
    }

    /// Count for a trace, if it was seen
    #[must_use]
    pub fn get(&self, trace: &str) -> Option<u64> {
        self.index.get(trace).map(|&idx| self.entries[idx].1)
    }

    /// Number of distinct traces
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts, equal to the number of folded samples
    #[must_use]
    pub fn total_samples(&self) -> u64 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    /// (trace, count) pairs in first-occurrence order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(trace, count)| (trace.as_str(), *count))
    }

    /// Write one `"<trace> <count>\n"` line per entry
    ///
    /// # Errors
    /// Returns an error if the writer fails
    pub fn write_folded<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        for (trace, count) in self.iter() {
            writeln!(writer, "{trace} {count}")?;
        }
        writer.flush()
    }

    /// Folded lines as an in-memory buffer
    #[must_use]
    pub fn to_folded_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.write_folded(&mut out);
        out
    }
}

/// Build the folded trace of one event
///
/// Native frames are dropped, the remaining leaf-first frames are reversed to
/// root-first order and joined with `;`. An event without a stack folds to
/// the empty trace.
#[must_use]
pub fn folded_trace(event: &RecordedEvent) -> String {
    let Some(stack) = &event.stack else {
        return String::new();
    };

    let managed: Vec<String> =
        stack.iter().filter(|frame| frame.is_managed()).map(RecordedFrame::identifier).collect();
    let mut root_first = managed;
    root_first.reverse();
    root_first.join(";")
}

/// Fold every execution sample of an event stream
///
/// # Errors
/// Returns the first error produced by the stream; the remaining events are
/// not pulled
pub fn fold_events<I>(events: I) -> Result<TraceCounts>
where
    I: IntoIterator<Item = Result<RecordedEvent>>,
{
    let mut counts = TraceCounts::new();
    for event in events {
        let event = event?;
        if event.is_type(EXECUTION_SAMPLE) {
            counts.record(folded_trace(&event));
        }
    }
    Ok(counts)
}

/// Fold the execution samples of a persisted recording
///
/// The reader is owned by this call and dropped on every exit path, so the
/// file is closed whether folding succeeds or fails part-way.
///
/// # Errors
/// Returns an error if the recording cannot be opened or parsed
pub fn fold_stacks(backend: &dyn RecordingBackend, recording: &Path) -> Result<TraceCounts> {
    let reader = backend.open_for_read(recording)?;
    fold_events(Events::new(reader))
}

/// Fold a recording and render it as folded-stack text
///
/// # Errors
/// Returns an error if the recording cannot be opened or parsed
pub fn stacks_from_recording(backend: &dyn RecordingBackend, recording: &Path) -> Result<Vec<u8>> {
    Ok(fold_stacks(backend, recording)?.to_folded_bytes())
}

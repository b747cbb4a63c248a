//! Recording file reader and writer
//!
//! See [`flightbox_common`] for the JSON-lines layout. Writers buffer events
//! and flush on [`RecordingWriter::finish`]; readers pull one line at a time,
//! so reading a recording never holds more than one event in memory.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flightbox_common::{RecordedEvent, RecordingHeader};

use super::backend::EventReader;
use crate::domain::{CaptureError, Result};

/// Streaming writer for one recording file
pub struct RecordingWriter<W: Write> {
    out: W,
    events_written: usize,
}

impl RecordingWriter<BufWriter<File>> {
    /// Create (or truncate) the file at `path` and write the header
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written
    pub fn create(path: &Path, header: &RecordingHeader) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), header)
    }
}

impl<W: Write> RecordingWriter<W> {
    /// Wrap a writer and write the header line
    ///
    /// # Errors
    /// Returns an error if the header cannot be written
    pub fn new(mut out: W, header: &RecordingHeader) -> Result<Self> {
        serde_json::to_writer(&mut out, header)?;
        out.write_all(b"\n")?;
        Ok(Self { out, events_written: 0 })
    }

    /// Append one event
    ///
    /// # Errors
    /// Returns an error if the event cannot be serialized or written
    pub fn write_event(&mut self, event: &RecordedEvent) -> Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        self.out.write_all(b"\n")?;
        self.events_written += 1;
        Ok(())
    }

    #[must_use]
    pub fn events_written(&self) -> usize {
        self.events_written
    }

    /// Flush and return the underlying writer
    ///
    /// # Errors
    /// Returns an error if flushing fails
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Line-by-line reader for one recording file
pub struct RecordingFileReader<R: BufRead> {
    input: R,
    header: RecordingHeader,
    path: PathBuf,
    line_number: usize,
    line: String,
}

impl RecordingFileReader<BufReader<File>> {
    /// Open a recording file and validate its header
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, or
    /// [`CaptureError::MalformedRecording`] if the header is missing or foreign
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file), path)
    }
}

impl<R: BufRead> RecordingFileReader<R> {
    /// Wrap a reader and parse the header line
    ///
    /// `path` is only used in error messages.
    ///
    /// # Errors
    /// Returns [`CaptureError::MalformedRecording`] if the header is missing,
    /// unparsable, or of an unsupported format/version
    pub fn new(mut input: R, path: &Path) -> Result<Self> {
        let malformed = |reason: String| CaptureError::MalformedRecording {
            path: path.display().to_string(),
            reason,
        };

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(malformed("empty file, no recording header".to_string()));
        }

        let header: RecordingHeader =
            serde_json::from_str(line.trim_end()).map_err(|e| malformed(format!("header: {e}")))?;
        if !header.is_supported() {
            return Err(malformed(format!(
                "unsupported format {:?} version {}",
                header.format, header.version
            )));
        }

        Ok(Self { input, header, path: path.to_path_buf(), line_number: 1, line })
    }

    #[must_use]
    pub fn header(&self) -> &RecordingHeader {
        &self.header
    }
}

impl<R: BufRead> EventReader for RecordingFileReader<R> {
    fn next_event(&mut self) -> Result<Option<RecordedEvent>> {
        loop {
            self.line.clear();
            if self.input.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }

            return serde_json::from_str(trimmed).map(Some).map_err(|e| {
                CaptureError::MalformedRecording {
                    path: self.path.display().to_string(),
                    reason: format!("line {}: {e}", self.line_number),
                }
            });
        }
    }
}

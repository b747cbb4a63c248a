//! Bounded in-process byte pipe
//!
//! The writer half is fed by a background thread; the reader half is handed
//! to the caller. Bytes travel as chunks of up to [`CHUNK_SIZE`] over a
//! bounded channel, so a slow reader blocks the writer instead of buffering
//! the whole stream twice.
//!
//! ```text
//! PipeWriter::write ──▶ [chunk][chunk]...[End] ──▶ PipeReader::read
//!     (blocks when `capacity` chunks are queued)
//! ```

use std::io::{self, Read, Write};

use crossbeam_channel::{Receiver, Sender};

use crate::domain::CaptureError;

/// Maximum bytes per chunk
pub const CHUNK_SIZE: usize = 8 * 1024;

enum Chunk {
    Data(Vec<u8>),
    End,
}

/// Create a pipe holding at most `capacity` chunks in flight (minimum 1)
#[must_use]
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (
        PipeWriter { tx, pending: Vec::with_capacity(CHUNK_SIZE) },
        PipeReader { rx, current: Vec::new(), pos: 0, finished: false },
    )
}

/// Sending half
///
/// Dropping the writer without calling [`PipeWriter::finish`] makes the
/// reader fail with [`CaptureError::StreamClosedEarly`].
pub struct PipeWriter {
    tx: Sender<Chunk>,
    pending: Vec<u8>,
}

impl PipeWriter {
    fn send(&self, chunk: Chunk) -> io::Result<()> {
        self.tx
            .send(chunk)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "archive stream reader dropped"))
    }

    fn send_pending(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.pending, Vec::with_capacity(CHUNK_SIZE));
        self.send(Chunk::Data(chunk))
    }

    /// Flush buffered bytes and mark the end of the stream
    ///
    /// # Errors
    /// Returns [`io::ErrorKind::BrokenPipe`] if the reader is gone
    pub fn finish(mut self) -> io::Result<()> {
        self.send_pending()?;
        self.send(Chunk::End)
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.pending.len() >= CHUNK_SIZE {
            self.send_pending()?;
        }
        let n = buf.len().min(CHUNK_SIZE - self.pending.len());
        self.pending.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_pending()
    }
}

/// Receiving half
pub struct PipeReader {
    rx: Receiver<Chunk>,
    current: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if self.pos < self.current.len() {
                let n = buf.len().min(self.current.len() - self.pos);
                buf[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }

            match self.rx.recv() {
                Ok(Chunk::Data(data)) => {
                    self.current = data;
                    self.pos = 0;
                }
                Ok(Chunk::End) => self.finished = true,
                Err(_) => {
                    return Err(io::Error::new(io::ErrorKind::UnexpectedEof, CaptureError::StreamClosedEarly));
                }
            }
        }
    }
}

/// A completed capture archive, streamed from the feeder thread
pub struct ArchiveStream {
    reader: PipeReader,
    len: usize,
}

impl ArchiveStream {
    pub(crate) fn new(reader: PipeReader, len: usize) -> Self {
        Self { reader, len }
    }

    /// Total archive size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the whole archive into memory
    ///
    /// # Errors
    /// Returns an error if the stream ends early
    pub fn read_to_vec(mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.len);
        self.reader.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl Read for ArchiveStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

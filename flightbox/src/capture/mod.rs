//! Capture module
//!
//! Runs the capture sequence on a background worker and hands the resulting
//! archive back through a [`CaptureHandle`] and a bounded pipe.

pub mod handle;
pub mod orchestrator;
pub mod pipe;
pub mod request;

pub use handle::CaptureHandle;
pub use orchestrator::{capture_async, FlightRecorder, DEFAULT_PIPE_CAPACITY};
pub use pipe::{pipe, ArchiveStream, PipeReader, PipeWriter, CHUNK_SIZE};
pub use request::CaptureRequest;

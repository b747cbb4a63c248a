//! Structured error types for flightbox
//!
//! Using thiserror for automatic Display implementation and error chaining.

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T, E = CaptureError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Recording configuration \"{0}\" not found")]
    ConfigurationNotFound(String),

    #[error("Invalid filename prefix {0:?}: must be non-empty and contain no path separators")]
    InvalidPrefix(String),

    #[error("Sampler unavailable: {0}")]
    SamplerUnavailable(String),

    #[error("Malformed recording {path}: {reason}")]
    MalformedRecording { path: String, reason: String },

    #[error("Invalid recording configuration in {path}: {reason}")]
    InvalidConfiguration { path: String, reason: String },

    #[error("Capture worker exited without producing a result")]
    WorkerLost,

    #[error("Archive stream closed before the archive was fully delivered")]
    StreamClosedEarly,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CaptureError {
    /// Returns true if this error was raised because the caller stopped
    /// receiving archive bytes before the end of the stream
    #[must_use]
    pub fn is_stream_closed_early(err: &std::io::Error) -> bool {
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<CaptureError>())
            .is_some_and(|inner| matches!(inner, CaptureError::StreamClosedEarly))
    }
}

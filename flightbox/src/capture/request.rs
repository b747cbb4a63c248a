//! Capture parameters

use std::time::Duration;

/// What to capture
///
/// `None` (or zero) durations skip the corresponding recording window, which
/// then shows up as a zero-length archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Length of the `profile` recording window
    pub profile_duration: Option<Duration>,
    /// Length of the `default` recording window, recorded after the profile one
    pub default_duration: Option<Duration>,
    /// Archive directory and entry name prefix
    pub filename_prefix: String,
    /// Whether to add a task dump entry
    pub include_task_dump: bool,
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self {
            profile_duration: Some(Duration::from_secs(10)),
            default_duration: None,
            filename_prefix: "flightbox".to_string(),
            include_task_dump: false,
        }
    }
}

impl CaptureRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn profile_duration(mut self, duration: Option<Duration>) -> Self {
        self.profile_duration = duration;
        self
    }

    #[must_use]
    pub fn default_duration(mut self, duration: Option<Duration>) -> Self {
        self.default_duration = duration;
        self
    }

    #[must_use]
    pub fn filename_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.filename_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn include_task_dump(mut self, include: bool) -> Self {
        self.include_task_dump = include;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let request = CaptureRequest::default();
        assert_eq!(request.profile_duration, Some(Duration::from_secs(10)));
        assert_eq!(request.default_duration, None);
        assert_eq!(request.filename_prefix, "flightbox");
        assert!(!request.include_task_dump);
    }

    #[test]
    fn test_builder() {
        let request = CaptureRequest::new()
            .profile_duration(None)
            .default_duration(Some(Duration::from_secs(1)))
            .filename_prefix("svc")
            .include_task_dump(true);
        assert_eq!(request.profile_duration, None);
        assert_eq!(request.default_duration, Some(Duration::from_secs(1)));
        assert_eq!(request.filename_prefix, "svc");
        assert!(request.include_task_dump);
    }
}

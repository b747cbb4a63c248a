//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep validated values apart from raw strings and
//! integers, and make function signatures more expressive.

use std::fmt;

use super::errors::CaptureError;

/// Filename prefix for a capture archive
///
/// Used both as the archive's top-level directory and as the prefix of every
/// entry name, so it must be a single path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilenamePrefix(String);

impl FilenamePrefix {
    /// Validate and wrap a prefix
    ///
    /// # Errors
    /// Returns [`CaptureError::InvalidPrefix`] if the prefix is empty, is `.`
    /// or `..`, or contains a path separator or NUL byte
    pub fn new(prefix: impl Into<String>) -> Result<Self, CaptureError> {
        let prefix = prefix.into();
        let invalid = prefix.is_empty()
            || prefix == "."
            || prefix == ".."
            || prefix.contains(['/', '\\', '\0']);
        if invalid {
            return Err(CaptureError::InvalidPrefix(prefix));
        }
        Ok(Self(prefix))
    }

    /// Get the prefix as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilenamePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tracked task ID
///
/// Assigned sequentially by the task registry, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

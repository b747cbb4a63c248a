//! Task introspection seam used by captures

use std::io::{self, Write};

use log::warn;

use super::registry::{is_installed, snapshot_all_tasks};
use super::snapshot::write_task_dump;

/// Written instead of a dump when introspection is not active
pub const NOT_INSTALLED_MESSAGE: &str =
    "Task introspection is not installed. Call flightbox::tasks::install() at start of application";

/// Source of task dumps
pub trait TaskIntrospection: Send + Sync {
    /// Whether dumps can be produced right now
    fn is_active(&self) -> bool;

    /// Write a human-readable dump of all live tasks
    ///
    /// # Errors
    /// Returns an error if writing fails
    fn dump_all_tasks(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// Introspection over the process-wide task registry
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalTasks;

impl TaskIntrospection for GlobalTasks {
    fn is_active(&self) -> bool {
        is_installed()
    }

    fn dump_all_tasks(&self, out: &mut dyn Write) -> io::Result<()> {
        write_task_dump(out, &snapshot_all_tasks())
    }
}

/// Capture a task dump as text
///
/// Never fails: an inactive facility yields [`NOT_INSTALLED_MESSAGE`], and a
/// facility that errors part-way keeps what it wrote so far.
#[must_use]
pub fn capture_task_dump(introspection: &dyn TaskIntrospection) -> Vec<u8> {
    let mut out = Vec::new();
    if !introspection.is_active() {
        out.extend_from_slice(NOT_INSTALLED_MESSAGE.as_bytes());
        out.push(b'\n');
        return out;
    }

    if let Err(e) = introspection.dump_all_tasks(&mut out) {
        warn!("Task dump incomplete: {e}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Inactive;

    impl TaskIntrospection for Inactive {
        fn is_active(&self) -> bool {
            false
        }

        fn dump_all_tasks(&self, _out: &mut dyn Write) -> io::Result<()> {
            panic!("must not be called while inactive")
        }
    }

    struct FailsHalfway;

    impl TaskIntrospection for FailsHalfway {
        fn is_active(&self) -> bool {
            true
        }

        fn dump_all_tasks(&self, out: &mut dyn Write) -> io::Result<()> {
            out.write_all(b"Task #1 \"partial\"\n")?;
            Err(io::Error::other("registry went away"))
        }
    }

    #[test]
    fn test_inactive_yields_install_hint() {
        let dump = String::from_utf8(capture_task_dump(&Inactive)).unwrap();
        assert_eq!(dump.trim_end(), NOT_INSTALLED_MESSAGE);
    }

    #[test]
    fn test_write_error_keeps_partial_text() {
        let dump = capture_task_dump(&FailsHalfway);
        assert_eq!(dump, b"Task #1 \"partial\"\n");
    }
}

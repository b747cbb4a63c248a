//! Frame kind classification for distinguishing Rust code from native code.
//!
//! Only managed (Rust) frames take part in stack folding, so every frame
//! the sampler captures is classified once, when the recording is persisted.
//!
//! # Classification Strategy
//!
//! 1. **Unresolved frames** - raw addresses and `Unknown` symbols are native
//! 2. **Sampler internals** - `pprof`/`backtrace` frames from the signal
//!    handler are native, they are never part of the sampled program
//! 3. **File path patterns** - most reliable when debug info is available
//!    - `*.rs` → Rust source
//!    - `*.c`, `*.S`, `*.h`, `/usr/`, `/lib/` → system code
//! 4. **Function name shape** - fallback when file paths are unavailable
//!    - Rust paths (`crate::module::function`) → managed
//!    - libc/loader symbols (`__clone3`, `start_thread`, ...) → native

use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use flightbox_common::FrameKind;

/// Classify a stack frame based on its function name and file path.
///
/// # Examples
///
/// ```
/// use flightbox::classification::classify_frame;
/// use flightbox_common::FrameKind;
///
/// assert_eq!(classify_frame("myapp::handler::process", Some("src/handler.rs")), FrameKind::Managed);
/// assert_eq!(classify_frame("__libc_start_main", None), FrameKind::Native);
/// ```
#[must_use]
pub fn classify_frame(function: &str, file: Option<&str>) -> FrameKind {
    // === UNRESOLVED CHECK ===
    if is_unresolved(function) {
        diagnostics().record_classification(false);
        return FrameKind::Native;
    }

    // === SAMPLER INTERNALS ===
    let bare = function.trim_start_matches('<');
    if SAMPLER_PREFIXES.iter().any(|p| bare.starts_with(p)) {
        return FrameKind::Native;
    }

    // === FILE PATH CLASSIFICATION ===
    if let Some(path) = file {
        diagnostics().record_classification(true);

        if path.ends_with(".rs") {
            return FrameKind::Managed;
        }
        if NATIVE_SOURCE_SUFFIXES.iter().any(|s| path.ends_with(s))
            || path.starts_with("/usr/")
            || path.starts_with("/lib/")
        {
            return FrameKind::Native;
        }
    } else {
        diagnostics().record_classification(false);
    }

    // === FUNCTION NAME CLASSIFICATION ===
    if NATIVE_PREFIXES.iter().any(|p| function.starts_with(p)) {
        return FrameKind::Native;
    }

    // Rust symbols demangle to paths; C symbols never contain `::`
    if function.contains("::") {
        FrameKind::Managed
    } else {
        FrameKind::Native
    }
}

// =============================================================================
// CLASSIFICATION TABLES
// =============================================================================

/// Crates whose frames belong to the sampler rather than the sampled program
const SAMPLER_PREFIXES: &[&str] = &["pprof::", "backtrace::", "findshlibs::"];

/// Well-known libc / dynamic loader entry points
const NATIVE_PREFIXES: &[&str] = &[
    "__",
    "_start",
    "start_thread",
    "clone",
    "syscall",
    "pthread_",
    "epoll_wait",
    "futex",
    "nanosleep",
    "clock_nanosleep",
];

/// Source file suffixes for C and assembly code
const NATIVE_SOURCE_SUFFIXES: &[&str] = &[".c", ".S", ".s", ".h"];

fn is_unresolved(function: &str) -> bool {
    function.is_empty()
        || function == "Unknown"
        || function == "<unknown>"
        || function.starts_with("0x")
}

// =============================================================================
// CLASSIFICATION DIAGNOSTICS
// =============================================================================

/// Tracks how many frames were classified with and without source file info,
/// so a recording made from a stripped binary can be spotted in the logs.
pub struct ClassificationDiagnostics {
    frames_with_debug_info: AtomicU64,
    frames_without_debug_info: AtomicU64,
}

impl ClassificationDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self { frames_with_debug_info: AtomicU64::new(0), frames_without_debug_info: AtomicU64::new(0) }
    }

    fn record_classification(&self, had_file_path: bool) {
        if had_file_path {
            self.frames_with_debug_info.fetch_add(1, Ordering::Relaxed);
        } else {
            self.frames_without_debug_info.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Calculate the percentage of frames that had debug info available.
    ///
    /// Returns 100.0 if no frames have been classified yet.
    #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for percentages
    pub fn debug_info_coverage(&self) -> f64 {
        let with = self.frames_with_debug_info.load(Ordering::Relaxed);
        let without = self.frames_without_debug_info.load(Ordering::Relaxed);
        let total = with + without;

        if total > 0 {
            (with as f64 / total as f64) * 100.0
        } else {
            100.0
        }
    }

    /// Returns true if debug info coverage is below 50%.
    pub fn has_low_coverage(&self) -> bool {
        self.debug_info_coverage() < 50.0
    }

    /// Log the current coverage at debug level
    pub fn log_coverage(&self) {
        let coverage = self.debug_info_coverage();
        if self.has_low_coverage() {
            debug!("Only {coverage:.1}% of sampled frames had debug info; build with `debug = true`");
        } else {
            debug!("{coverage:.1}% of sampled frames had debug info");
        }
    }
}

impl Default for ClassificationDiagnostics {
    fn default() -> Self {
        Self::new()
    }
}

/// Global diagnostics instance, initialized on first access.
static DIAGNOSTICS: OnceLock<ClassificationDiagnostics> = OnceLock::new();

/// Get the global classification diagnostics tracker.
pub fn diagnostics() -> &'static ClassificationDiagnostics {
    DIAGNOSTICS.get_or_init(ClassificationDiagnostics::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_path_with_source_is_managed() {
        let kind = classify_frame("myapp::main", Some("src/main.rs"));
        assert_eq!(kind, FrameKind::Managed);
    }

    #[test]
    fn test_rust_path_without_debug_info_is_managed() {
        let kind = classify_frame("tokio::runtime::scheduler::inject::Inject::push", None);
        assert_eq!(kind, FrameKind::Managed);
    }

    #[test]
    fn test_std_by_rustc_path() {
        let kind = classify_frame(
            "std::io::Read::read",
            Some("/rustc/abc123def/library/std/src/io/mod.rs"),
        );
        assert_eq!(kind, FrameKind::Managed);
    }

    #[test]
    fn test_libc_symbols_are_native() {
        assert_eq!(classify_frame("__libc_start_main", None), FrameKind::Native);
        assert_eq!(classify_frame("start_thread", Some("./nptl/pthread_create.c")), FrameKind::Native);
        assert_eq!(classify_frame("clone3", None), FrameKind::Native);
        assert_eq!(classify_frame("memcpy", None), FrameKind::Native);
    }

    #[test]
    fn test_unresolved_is_native() {
        assert_eq!(classify_frame("0x7fff12345678", None), FrameKind::Native);
        assert_eq!(classify_frame("Unknown", None), FrameKind::Native);
        assert_eq!(classify_frame("", None), FrameKind::Native);
    }

    #[test]
    fn test_sampler_frames_are_native() {
        let kind = classify_frame(
            "pprof::profiler::perf_signal_handler",
            Some("/home/user/.cargo/registry/src/index.crates.io-xxx/pprof-0.14.0/src/profiler.rs"),
        );
        assert_eq!(kind, FrameKind::Native);

        let kind = classify_frame("<backtrace::Frame as core::fmt::Debug>::fmt", None);
        assert_eq!(kind, FrameKind::Native);
    }

    #[test]
    fn test_trait_impl_is_managed() {
        let kind = classify_frame("<myapp::Job as core::future::future::Future>::poll", None);
        assert_eq!(kind, FrameKind::Managed);
    }
}

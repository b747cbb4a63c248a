//! Turning sampled symbols into recorded frames
//!
//! The sampler hands us raw (mangled) symbol names. Each one is demangled,
//! split into a declaring type and a member, and classified:
//!
//! ```text
//! _ZN5myapp6worker4Pool3run17h0123456789abcdefE
//!   → demangle  → myapp::worker::Pool::run
//!   → split     → ("myapp::worker::Pool", "run")
//!   → classify  → Managed
//! ```

use rustc_demangle::demangle;

use flightbox_common::RecordedFrame;

use crate::classification::classify_frame;

/// Demangle a Rust symbol name without its hash suffix
///
/// Non-Rust symbols are returned unchanged.
#[must_use]
pub fn demangle_symbol(symbol: &str) -> String {
    format!("{:#}", demangle(symbol))
}

/// Split a demangled path at its last `::` outside generic brackets
///
/// Returns `("", name)` for names without a path.
#[must_use]
pub fn split_qualified_name(name: &str) -> (&str, &str) {
    let bytes = name.as_bytes();
    let mut depth = 0usize;
    let mut split_at = None;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            // `->` in fn pointer types is not a closing bracket
            b'>' if i == 0 || bytes[i - 1] != b'-' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                split_at = Some(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }

    match split_at {
        Some(pos) => (&name[..pos], &name[pos + 2..]),
        None => ("", name),
    }
}

/// Build a recorded frame from a demangled function name and optional location
///
/// `;` separates frames in folded stacks, so it is replaced inside names
/// (it shows up in array types such as `[u8; 16]`).
#[must_use]
pub fn recorded_frame(function: &str, file: Option<&str>, line: Option<u32>) -> RecordedFrame {
    let function = function.replace(';', ":");
    let kind = classify_frame(&function, file);
    let (type_name, method) = split_qualified_name(&function);

    RecordedFrame {
        type_name: type_name.to_string(),
        method: method.to_string(),
        kind,
        file: file.map(ToString::to_string),
        line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightbox_common::FrameKind;

    #[test]
    fn test_demangle_drops_hash() {
        let name = demangle_symbol("_ZN5myapp6worker4Pool3run17h0123456789abcdefE");
        assert_eq!(name, "myapp::worker::Pool::run");
    }

    #[test]
    fn test_demangle_passes_c_symbols_through() {
        assert_eq!(demangle_symbol("__libc_start_main"), "__libc_start_main");
    }

    #[test]
    fn test_split_plain_path() {
        assert_eq!(split_qualified_name("myapp::worker::Pool::run"), ("myapp::worker::Pool", "run"));
        assert_eq!(split_qualified_name("main"), ("", "main"));
    }

    #[test]
    fn test_split_ignores_generic_arguments() {
        assert_eq!(
            split_qualified_name("<myapp::Job as core::future::future::Future>::poll"),
            ("<myapp::Job as core::future::future::Future>", "poll")
        );
        assert_eq!(
            split_qualified_name("alloc::vec::Vec<T>::push"),
            ("alloc::vec::Vec<T>", "push")
        );
    }

    #[test]
    fn test_split_handles_fn_pointer_arrows() {
        assert_eq!(
            split_qualified_name("<fn() -> u8 as core::ops::FnOnce<()>>::call_once"),
            ("<fn() -> u8 as core::ops::FnOnce<()>>", "call_once")
        );
    }

    #[test]
    fn test_recorded_frame_round_trips_identifier() {
        let frame = recorded_frame("myapp::main::{{closure}}", Some("src/main.rs"), Some(12));
        assert_eq!(frame.kind, FrameKind::Managed);
        assert_eq!(frame.identifier(), "myapp::main::{{closure}}");
        assert_eq!(frame.line, Some(12));
    }

    #[test]
    fn test_recorded_frame_replaces_separator() {
        let frame = recorded_frame("<[u8; 16] as myapp::Hash>::hash", None, None);
        assert!(!frame.identifier().contains(';'));
    }
}

//! Analysis module
//!
//! Post-processing of persisted recordings into flame graph input.

pub mod folded;

pub use folded::{fold_events, fold_stacks, folded_trace, stacks_from_recording, TraceCounts};

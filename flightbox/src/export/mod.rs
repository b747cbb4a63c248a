//! Export module
//!
//! Packaging of capture artifacts into a single archive.

pub mod archive;

pub use archive::{assemble, ArchiveEntryKind};

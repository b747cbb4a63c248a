//! # Flightbox - In-Process Flight Recording Captures
//!
//! Flightbox captures a time-bounded execution profile of the running process,
//! folds its stack samples into flame graph input, optionally dumps the state
//! of tracked Tokio tasks, and packages everything into a single zip archive
//! that is streamed back to the caller.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        User Application                         │
//! │        capture_async(...)  ──▶  CaptureHandle::wait()            │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ CaptureRequest
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Capture Worker (flightbox-capture)             │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │  Recording   │──▶│   Analysis   │──▶│    Export    │         │
//! │  │ profile then │   │ (folded      │   │ (zip archive)│         │
//! │  │   default    │   │   stacks)    │   └──────┬───────┘         │
//! │  └──────────────┘   └──────────────┘          │                 │
//! │         │                                     │                 │
//! │         ▼                   ┌──────────────┐  │                 │
//! │  ┌──────────────┐           │    Tasks     │──┘                 │
//! │  │Classification│           │ (task dump)  │                    │
//! │  └──────────────┘           └──────────────┘                    │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ archive bytes
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │        Pipe Feeder (flightbox-pipe) ══ bounded pipe ══▶ caller   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`recording`]: Recording backends, named configurations, the recording
//!   file format, and the in-process `pprof` sampling backend
//! - [`classification`]: Managed (Rust) vs native frame classification
//! - [`analysis`]: Folding execution samples into `trace count` lines
//! - [`tasks`]: Tracked task registry and task dumps
//! - [`export`]: Deterministic archive assembly
//! - [`capture`]: Orchestrator, result handle, and archive pipe
//! - [`domain`]: Errors and validated newtypes
//!
//! ## Typical Usage
//!
//! ```no_run
//! use std::io::Read;
//! use std::time::Duration;
//!
//! flightbox::tasks::install();
//!
//! let handle = flightbox::capture_async(
//!     Some(Duration::from_secs(10)),
//!     Some(Duration::from_secs(5)),
//!     "incident-42",
//!     true,
//! );
//!
//! let mut archive = Vec::new();
//! handle.wait()?.read_to_end(&mut archive)?;
//! std::fs::write("incident-42.zip", archive)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Archive Layout
//!
//! | Entry | Content |
//! |-------|---------|
//! | `{prefix}/{prefix}-profile-recording.fbr` | `profile` recording (empty if skipped) |
//! | `{prefix}/{prefix}-default-recording.fbr` | `default` recording (empty if skipped) |
//! | `{prefix}/{prefix}-stacks-folded.txt` | Folded stacks of the profile recording |
//! | `{prefix}/{prefix}-coroutines-dump.txt` | Task dump, only when requested |

pub mod analysis;
pub mod capture;
pub mod classification;
pub mod domain;
pub mod export;
pub mod recording;
pub mod tasks;

pub use capture::{capture_async, ArchiveStream, CaptureHandle, CaptureRequest, FlightRecorder};
pub use domain::{CaptureError, Result};

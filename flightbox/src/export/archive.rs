//! Capture archive assembly
//!
//! Bundles the two recordings, the folded stacks and the optional task dump
//! into one zip held in memory. Every entry lives under `{prefix}/`:
//!
//! ```text
//! test/test-profile-recording.fbr
//! test/test-default-recording.fbr
//! test/test-stacks-folded.txt
//! test/test-coroutines-dump.txt      (only with a task dump)
//! ```
//!
//! Entries carry a fixed timestamp and fixed permissions, so identical inputs
//! always produce identical archive bytes.

use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;

use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use flightbox_common::RECORDING_EXTENSION;

use crate::domain::{FilenamePrefix, Result};

/// The artifacts a capture archive can hold, in archive order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveEntryKind {
    ProfileRecording,
    DefaultRecording,
    StacksFolded,
    TaskDump,
}

impl ArchiveEntryKind {
    fn suffix(self) -> &'static str {
        match self {
            ArchiveEntryKind::ProfileRecording => "profile-recording",
            ArchiveEntryKind::DefaultRecording => "default-recording",
            ArchiveEntryKind::StacksFolded => "stacks-folded",
            ArchiveEntryKind::TaskDump => "coroutines-dump",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            ArchiveEntryKind::ProfileRecording | ArchiveEntryKind::DefaultRecording => {
                RECORDING_EXTENSION
            }
            ArchiveEntryKind::StacksFolded | ArchiveEntryKind::TaskDump => "txt",
        }
    }

    /// Full entry path: `{prefix}/{prefix}-<kind>.<ext>`
    #[must_use]
    pub fn entry_name(self, prefix: &FilenamePrefix) -> String {
        format!("{prefix}/{prefix}-{}.{}", self.suffix(), self.extension())
    }
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644)
}

/// Build the capture archive
///
/// Recordings are streamed from their files; the folded stacks and the task
/// dump come from memory. The task dump entry is written only when
/// `task_dump` is `Some`.
///
/// # Errors
/// Returns an I/O or zip error if any entry cannot be written. No partial
/// archive is returned.
pub fn assemble(
    prefix: &FilenamePrefix,
    profile_recording: &Path,
    default_recording: &Path,
    stacks: &[u8],
    task_dump: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    write_entry(&mut zip, prefix, ArchiveEntryKind::ProfileRecording, File::open(profile_recording)?)?;
    write_entry(&mut zip, prefix, ArchiveEntryKind::DefaultRecording, File::open(default_recording)?)?;
    write_entry(&mut zip, prefix, ArchiveEntryKind::StacksFolded, stacks)?;
    if let Some(dump) = task_dump {
        write_entry(&mut zip, prefix, ArchiveEntryKind::TaskDump, dump)?;
    }

    let bytes = zip.finish()?.into_inner();
    debug!("Assembled {} byte archive for prefix \"{prefix}\"", bytes.len());
    Ok(bytes)
}

fn write_entry<W, R>(
    zip: &mut ZipWriter<W>,
    prefix: &FilenamePrefix,
    kind: ArchiveEntryKind,
    mut content: R,
) -> Result<()>
where
    W: Write + io::Seek,
    R: Read,
{
    zip.start_file(kind.entry_name(prefix), entry_options())?;
    io::copy(&mut content, zip)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CaptureError;
    use zip::ZipArchive;

    fn prefix(name: &str) -> FilenamePrefix {
        FilenamePrefix::new(name).unwrap()
    }

    fn entry_names(archive: &[u8]) -> Vec<String> {
        let zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        zip.file_names().map(ToString::to_string).collect()
    }

    fn read_entry(archive: &[u8], name: &str) -> Vec<u8> {
        let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        let mut out = Vec::new();
        zip.by_name(name).unwrap().read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_entry_names() {
        let p = prefix("test");
        assert_eq!(ArchiveEntryKind::ProfileRecording.entry_name(&p), "test/test-profile-recording.fbr");
        assert_eq!(ArchiveEntryKind::DefaultRecording.entry_name(&p), "test/test-default-recording.fbr");
        assert_eq!(ArchiveEntryKind::StacksFolded.entry_name(&p), "test/test-stacks-folded.txt");
        assert_eq!(ArchiveEntryKind::TaskDump.entry_name(&p), "test/test-coroutines-dump.txt");
    }

    #[test]
    fn test_entries_and_contents() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("profile.fbr");
        let default = dir.path().join("default.fbr");
        std::fs::write(&profile, b"profile bytes").unwrap();
        std::fs::write(&default, b"").unwrap();

        let p = prefix("cap");
        let without = assemble(&p, &profile, &default, b"a;b 1\n", None).unwrap();
        let mut names = entry_names(&without);
        names.sort();
        assert_eq!(
            names,
            vec!["cap/cap-default-recording.fbr", "cap/cap-profile-recording.fbr", "cap/cap-stacks-folded.txt"]
        );
        assert_eq!(read_entry(&without, "cap/cap-profile-recording.fbr"), b"profile bytes");
        assert!(read_entry(&without, "cap/cap-default-recording.fbr").is_empty());
        assert_eq!(read_entry(&without, "cap/cap-stacks-folded.txt"), b"a;b 1\n");

        let with = assemble(&p, &profile, &default, b"", Some(b"Tracked tasks: 0\n")).unwrap();
        assert_eq!(entry_names(&with).len(), 4);
        assert_eq!(read_entry(&with, "cap/cap-coroutines-dump.txt"), b"Tracked tasks: 0\n");
    }

    #[test]
    fn test_entries_are_written_in_fixed_order() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("profile.fbr");
        let default = dir.path().join("default.fbr");
        std::fs::write(&profile, b"p").unwrap();
        std::fs::write(&default, b"d").unwrap();

        let archive = assemble(&prefix("cap"), &profile, &default, b"main 1\n", Some(b"dump")).unwrap();
        let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        let order: Vec<String> = (0..zip.len()).map(|i| zip.by_index(i).unwrap().name().to_string()).collect();
        assert_eq!(
            order,
            vec![
                "cap/cap-profile-recording.fbr",
                "cap/cap-default-recording.fbr",
                "cap/cap-stacks-folded.txt",
                "cap/cap-coroutines-dump.txt",
            ]
        );
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("p.fbr");
        let default = dir.path().join("d.fbr");
        std::fs::write(&profile, vec![b'x'; 64 * 1024]).unwrap();
        std::fs::write(&default, b"default").unwrap();

        let p = prefix("same");
        let first = assemble(&p, &profile, &default, b"main 3\n", Some(b"dump")).unwrap();
        let second = assemble(&p, &profile, &default, b"main 3\n", Some(b"dump")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_fixed_entry_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("r.fbr");
        std::fs::write(&file, b"r").unwrap();

        let archive = assemble(&prefix("meta"), &file, &file, b"", None).unwrap();
        let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        let entry = zip.by_index(0).unwrap();
        assert_eq!(entry.unix_mode().map(|mode| mode & 0o777), Some(0o644));
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
    }

    #[test]
    fn test_missing_recording_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.fbr");
        let err = assemble(&prefix("x"), &missing, &missing, b"", None).unwrap_err();
        assert!(matches!(err, CaptureError::Io(_)));
    }
}

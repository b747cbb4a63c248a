//! Shared fixtures for capture pipeline tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use flightbox::domain::{CaptureError, Result};
use flightbox::recording::{
    EventReader, RecordingBackend, RecordingConfiguration, RecordingFileReader, RecordingSession,
    RecordingWriter,
};
use flightbox::tasks::TaskIntrospection;
use flightbox_common::{RecordedEvent, RecordedFrame, RecordingHeader};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// What a [`FakeBackend`] did, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Begin(String),
    Stop(String),
}

/// Backend replaying scripted events instead of sampling
///
/// Each configuration name maps to the events its sessions persist.
#[derive(Clone, Default)]
pub struct FakeBackend {
    scripts: HashMap<String, Vec<RecordedEvent>>,
    calls: Arc<Mutex<Vec<(Call, Instant)>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend knowing `profile` and `default`, both with the given samples
    pub fn with_builtins(events: Vec<RecordedEvent>) -> Self {
        Self::new().script("profile", events.clone()).script("default", events)
    }

    pub fn script(mut self, name: &str, events: Vec<RecordedEvent>) -> Self {
        self.scripts.insert(name.to_string(), events);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(call, _)| call.clone()).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Call, Instant)> {
        self.calls.lock().unwrap().clone()
    }
}

impl RecordingBackend for FakeBackend {
    fn resolve_configuration(&self, name: &str) -> Result<RecordingConfiguration> {
        if !self.scripts.contains_key(name) {
            return Err(CaptureError::ConfigurationNotFound(name.to_string()));
        }
        Ok(RecordingConfiguration {
            name: name.to_string(),
            description: "scripted".to_string(),
            execution_sample_hz: None,
            process_stats_interval_ms: None,
            blocklist: Vec::new(),
        })
    }

    fn begin(&self, configuration: &RecordingConfiguration) -> Result<Box<dyn RecordingSession>> {
        self.calls.lock().unwrap().push((Call::Begin(configuration.name.clone()), Instant::now()));
        Ok(Box::new(FakeSession {
            configuration: configuration.clone(),
            events: self.scripts[&configuration.name].clone(),
            calls: Arc::clone(&self.calls),
        }))
    }

    fn open_for_read(&self, path: &Path) -> Result<Box<dyn EventReader>> {
        Ok(Box::new(RecordingFileReader::open(path)?))
    }
}

struct FakeSession {
    configuration: RecordingConfiguration,
    events: Vec<RecordedEvent>,
    calls: Arc<Mutex<Vec<(Call, Instant)>>>,
}

impl RecordingSession for FakeSession {
    fn configuration(&self) -> &RecordingConfiguration {
        &self.configuration
    }

    fn stop_and_persist(self: Box<Self>, path: &Path) -> Result<()> {
        let header = RecordingHeader::new(&self.configuration.name, 0, 0);
        let mut writer = RecordingWriter::create(path, &header)?;
        for event in &self.events {
            writer.write_event(event)?;
        }
        writer.finish()?;
        self.calls.lock().unwrap().push((Call::Stop(self.configuration.name.clone()), Instant::now()));
        Ok(())
    }
}

/// Introspection returning fixed text
pub struct FakeIntrospection {
    pub active: bool,
    pub text: &'static str,
}

impl TaskIntrospection for FakeIntrospection {
    fn is_active(&self) -> bool {
        self.active
    }

    fn dump_all_tasks(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(self.text.as_bytes())
    }
}

/// Leaf-first execution sample of `module::function` frames
pub fn sample(leaf_first: &[&str]) -> RecordedEvent {
    let stack = leaf_first
        .iter()
        .map(|path| {
            let (type_name, method) = path.rsplit_once("::").unwrap_or(("", path));
            RecordedFrame::managed(type_name, method)
        })
        .collect();
    RecordedEvent::execution_sample(0, stack)
}

pub fn entry_names(archive: &[u8]) -> Vec<String> {
    let zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
    let mut names: Vec<String> = zip.file_names().map(ToString::to_string).collect();
    names.sort();
    names
}

pub fn read_entry(archive: &[u8], name: &str) -> Vec<u8> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
    let mut out = Vec::new();
    zip.by_name(name).unwrap().read_to_end(&mut out).unwrap();
    out
}

pub fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

//! Named recording configurations
//!
//! A configuration is a predefined set of sampling parameters resolved by
//! name when a session starts. Two are built in (`profile` and `default`);
//! more can be loaded from JSON files.
//!
//! ```json
//! {
//!   "name": "hot",
//!   "description": "High-frequency stacks only",
//!   "execution_sample_hz": 250,
//!   "process_stats_interval_ms": null
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{CaptureError, Result};

/// Name of the built-in configuration used for the profile window
pub const PROFILE_CONFIGURATION: &str = "profile";

/// Name of the built-in configuration used for the default window
pub const DEFAULT_CONFIGURATION: &str = "default";

/// Shared objects the sampler must not unwind into
const DEFAULT_BLOCKLIST: &[&str] = &["libc", "libgcc", "pthread", "vdso"];

/// Sampling parameters for one recording session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingConfiguration {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Stack sampling frequency; `None` disables execution samples
    #[serde(default)]
    pub execution_sample_hz: Option<u32>,
    /// Period of process statistics events; `None` disables them
    #[serde(default)]
    pub process_stats_interval_ms: Option<u64>,
    #[serde(default = "default_blocklist")]
    pub blocklist: Vec<String>,
}

fn default_blocklist() -> Vec<String> {
    DEFAULT_BLOCKLIST.iter().map(ToString::to_string).collect()
}

impl RecordingConfiguration {
    /// Fine-grained stack sampling for flame graphs
    #[must_use]
    pub fn profile() -> Self {
        Self {
            name: PROFILE_CONFIGURATION.to_string(),
            description: "Stack samples every 10 ms plus process statistics".to_string(),
            execution_sample_hz: Some(100),
            process_stats_interval_ms: Some(1000),
            blocklist: default_blocklist(),
        }
    }

    /// Low-overhead continuous diagnostics
    #[must_use]
    pub fn default_recording() -> Self {
        Self {
            name: DEFAULT_CONFIGURATION.to_string(),
            description: "Stack samples every 20 ms plus process statistics".to_string(),
            execution_sample_hz: Some(50),
            process_stats_interval_ms: Some(1000),
            blocklist: default_blocklist(),
        }
    }

    /// All built-in configurations
    #[must_use]
    pub fn builtins() -> Vec<Self> {
        vec![Self::profile(), Self::default_recording()]
    }

    /// Load configurations from a JSON file holding one object or an array
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, or
    /// [`CaptureError::InvalidConfiguration`] if it does not parse or a
    /// configuration has an empty name or a zero frequency/interval
    pub fn load_file(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|reason| CaptureError::InvalidConfiguration {
            path: path.display().to_string(),
            reason,
        })
    }

    fn parse(content: &str) -> std::result::Result<Vec<Self>, String> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(RecordingConfiguration),
            Many(Vec<RecordingConfiguration>),
        }

        let configurations = match serde_json::from_str(content).map_err(|e| e.to_string())? {
            OneOrMany::One(configuration) => vec![configuration],
            OneOrMany::Many(configurations) => configurations,
        };

        for configuration in &configurations {
            configuration.validate()?;
        }
        Ok(configurations)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("configuration name must not be empty".to_string());
        }
        if self.execution_sample_hz == Some(0) {
            return Err(format!("{}: execution_sample_hz must be positive", self.name));
        }
        if self.process_stats_interval_ms == Some(0) {
            return Err(format!("{}: process_stats_interval_ms must be positive", self.name));
        }
        Ok(())
    }
}

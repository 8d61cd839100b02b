//! Configuration loading and validation
//!
//! The agent is configured by a YAML file with a `sources` list and a `sinks`
//! list. Each entry carries a `type` discriminator plus type-specific fields;
//! entries with an unrecognized `type` are skipped with a warning when the
//! pipeline is built, so the raw shape here keeps every field optional.

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Resolved configuration: the `sources` and `sinks` sections
///
/// Both sections are required; a file missing either is a fatal
/// configuration error.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Configured event sources, in order
    pub sources: Vec<SourceConfig>,
    /// Configured output sinks, in order
    pub sinks: Vec<SinkConfig>,
}

/// One entry of the `sources` list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    /// Source type discriminator ("file", "linux_syslog", "linux_journald",
    /// "command", "windows_evtx", "windows_registry")
    #[serde(rename = "type")]
    pub kind: String,

    /// File path for tail-style sources
    pub path: Option<String>,

    /// Poll interval in seconds; each source kind has its own default
    pub interval: Option<f64>,

    /// Shell command for the command poller
    pub command: Option<String>,

    /// Registry keys for the registry poller
    #[serde(default)]
    pub keys: Vec<String>,

    /// Event log name for the event-log poller (default "Application")
    pub log_type: Option<String>,

    /// Remote machine for the event-log poller (default local)
    pub server: Option<String>,

    /// Substring filters; empty means collect everything
    #[serde(default)]
    pub filters: Vec<String>,
}

impl SourceConfig {
    /// Poll interval with a per-source default, ignoring non-positive values
    pub fn interval_or(&self, default_secs: f64) -> Duration {
        let secs = self.interval.filter(|i| *i > 0.0).unwrap_or(default_secs);
        Duration::from_secs_f64(secs)
    }
}

/// One entry of the `sinks` list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SinkConfig {
    /// Sink type discriminator ("stdout", "file", "http")
    #[serde(rename = "type")]
    pub kind: String,

    /// Output path for the file sink
    pub path: Option<String>,

    /// Endpoint for the HTTP sink
    pub url: Option<String>,

    /// Extra request headers for the HTTP sink
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Per-request timeout in seconds for the HTTP sink (default 10)
    pub timeout: Option<f64>,

    /// Static bearer token for the HTTP sink
    pub auth_token: Option<String>,
}

impl SinkConfig {
    /// Request timeout with a default, ignoring non-positive values
    pub fn timeout_or(&self, default_secs: f64) -> Duration {
        let secs = self.timeout.filter(|t| *t > 0.0).unwrap_or(default_secs);
        Duration::from_secs_f64(secs)
    }
}

impl Config {
    /// Load and validate the configuration file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file does not exist,
    /// `ConfigError::ValidationError` if it is empty, and
    /// `ConfigError::YamlError` if it cannot be parsed or is missing the
    /// `sources` or `sinks` section. All of these are fatal.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ReadError(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Configuration file is empty".to_string(),
            ));
        }

        let config: Config = serde_yml::from_str(&contents)?;
        Ok(config)
    }
}

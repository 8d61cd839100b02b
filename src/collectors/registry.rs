//! Poller-style collector for Windows registry values
//!
//! Enumerates each configured key's values once per interval through the
//! platform registry query tool (`reg query`). Unreadable keys are logged
//! and skipped; the cycle continues with the remaining keys.

use crate::collectors::Collector;
use crate::error::CollectorError;
use crate::events::{hostname, LogEvent};
use crate::shutdown::ShutdownFlag;
use log::{error, warn};
use serde_json::json;
use std::process::Command;
use std::sync::mpsc::Sender;
use std::time::Duration;

/// One value enumerated under a registry key
#[derive(Debug, PartialEq)]
struct RegistryValue {
    name: String,
    kind: String,
    data: String,
}

/// Collector that polls a fixed set of registry keys
pub struct RegistryCollector {
    keys: Vec<String>,
    interval: Duration,
    filters: Vec<String>,
    host: String,
}

impl RegistryCollector {
    /// Create a collector from its source configuration
    ///
    /// The poll interval defaults to 60s.
    pub fn new(config: &crate::config::SourceConfig) -> Self {
        Self {
            keys: config.keys.clone(),
            interval: config.interval_or(60.0),
            filters: config.filters.clone(),
            host: hostname(),
        }
    }

    /// Enumerate one key's values
    fn probe_key(&self, key_path: &str) -> Result<Vec<RegistryValue>, CollectorError> {
        let output = Command::new("reg")
            .args(["query", key_path])
            .output()
            .map_err(|e| CollectorError::SubprocessSpawn(format!("reg query: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollectorError::SubprocessTerminated(format!(
                "reg query {}: {}",
                key_path,
                stderr.trim()
            )));
        }

        Ok(parse_reg_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse `reg query` output into the values it lists
///
/// Value lines use fixed four-space column separators:
/// `    <name>    <REG_type>    <data>`. Key echo lines and subkey lines
/// start with the hive name and are skipped.
fn parse_reg_output(output: &str) -> Vec<RegistryValue> {
    let mut values = Vec::new();

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("HKEY_") {
            continue;
        }

        let parts: Vec<&str> = trimmed.splitn(3, "    ").map(str::trim).collect();
        if parts.len() < 2 || !parts[1].starts_with("REG_") {
            continue;
        }

        values.push(RegistryValue {
            name: parts[0].to_string(),
            kind: parts[1].to_string(),
            data: parts.get(2).unwrap_or(&"").to_string(),
        });
    }

    values
}

impl Collector for RegistryCollector {
    fn name(&self) -> &'static str {
        "windows_registry"
    }

    fn filters(&self) -> &[String] {
        &self.filters
    }

    fn collect(
        &mut self,
        events: &Sender<LogEvent>,
        shutdown: &ShutdownFlag,
    ) -> Result<(), CollectorError> {
        if !cfg!(target_os = "windows") {
            warn!("Registry collector is only supported on Windows, skipping");
            return Ok(());
        }

        if self.keys.is_empty() {
            error!("Registry collector requires 'keys' in config");
            return Ok(());
        }

        while !shutdown.is_triggered() {
            for key_path in &self.keys {
                if shutdown.is_triggered() {
                    return Ok(());
                }

                let values = match self.probe_key(key_path) {
                    Ok(values) => values,
                    Err(e) => {
                        error!("Error reading registry key {}: {}", key_path, e);
                        continue;
                    }
                };

                for value in values {
                    let message =
                        format!("Registry: {}\\{} = {}", key_path, value.name, value.data);
                    if !self.should_collect(&message) {
                        continue;
                    }

                    let event = LogEvent::new(
                        "windows_registry",
                        self.host.clone(),
                        message,
                        json!({
                            "key": key_path,
                            "name": value.name,
                            "value": value.data,
                            "type": value.kind,
                        }),
                    );
                    if events.send(event).is_err() {
                        return Ok(());
                    }
                }
            }

            if !shutdown.sleep_while_active(self.interval) {
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OUTPUT: &str = "\r\n\
HKEY_LOCAL_MACHINE\\SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Run\r\n\
    SecurityHealth    REG_EXPAND_SZ    %windir%\\system32\\SecurityHealthSystray.exe\r\n\
    One Drive Sync    REG_SZ    \"C:\\Program Files\\OneDrive.exe\" /background\r\n\
    EmptyMarker    REG_SZ\r\n\
\r\n\
HKEY_LOCAL_MACHINE\\SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Run\\SubKey\r\n";

    #[test]
    fn test_parse_reg_output_extracts_values() {
        let values = parse_reg_output(SAMPLE_OUTPUT);
        assert_eq!(values.len(), 3);

        assert_eq!(values[0].name, "SecurityHealth");
        assert_eq!(values[0].kind, "REG_EXPAND_SZ");
        assert_eq!(values[0].data, "%windir%\\system32\\SecurityHealthSystray.exe");

        // Names with spaces survive the column split
        assert_eq!(values[1].name, "One Drive Sync");
        assert_eq!(values[1].data, "\"C:\\Program Files\\OneDrive.exe\" /background");

        // A value with no data parses with empty data
        assert_eq!(values[2].name, "EmptyMarker");
        assert_eq!(values[2].data, "");
    }

    #[test]
    fn test_parse_reg_output_skips_key_and_subkey_lines() {
        let values = parse_reg_output(
            "HKEY_CURRENT_USER\\Software\\Test\r\nHKEY_CURRENT_USER\\Software\\Test\\Child\r\n",
        );
        assert!(values.is_empty());
    }

    #[test]
    fn test_parse_reg_output_ignores_unstructured_lines() {
        let values = parse_reg_output("random text\nEnd of search: 2 match(es) found.\n");
        assert!(values.is_empty());
    }

    #[test]
    #[cfg(not(target_os = "windows"))]
    fn test_collect_is_skipped_off_windows() {
        let mut collector = RegistryCollector::new(&crate::config::SourceConfig {
            kind: "windows_registry".to_string(),
            keys: vec!["HKLM\\SOFTWARE\\Test".to_string()],
            ..crate::config::SourceConfig::default()
        });

        let (tx, rx) = std::sync::mpsc::channel();
        let shutdown = ShutdownFlag::new();
        assert!(collector.collect(&tx, &shutdown).is_ok());
        assert!(rx.try_recv().is_err());
    }
}

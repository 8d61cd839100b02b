//! Poller-style collector for periodic command output
//!
//! Runs the configured shell command to completion once per interval and
//! emits a single event per cycle combining stdout and stderr. Cycles with
//! no output emit nothing; a failing cycle is logged and the poller moves on
//! to the next interval.

use crate::collectors::Collector;
use crate::error::CollectorError;
use crate::events::{hostname, LogEvent};
use crate::shutdown::ShutdownFlag;
use log::error;
use serde_json::json;
use std::process::Command;
use std::sync::mpsc::Sender;
use std::time::Duration;

/// Collector that polls a shell command
pub struct CommandCollector {
    command: Option<String>,
    interval: Duration,
    filters: Vec<String>,
    host: String,
}

impl CommandCollector {
    /// Create a collector from its source configuration
    ///
    /// `command` is required; the poll interval defaults to 60s.
    pub fn new(config: &crate::config::SourceConfig) -> Self {
        Self {
            command: config.command.clone(),
            interval: config.interval_or(60.0),
            filters: config.filters.clone(),
            host: hostname(),
        }
    }

    /// Run one probe cycle and build the event for it, if any
    fn probe(&self, command: &str) -> Option<LogEvent> {
        let output = if cfg!(target_os = "windows") {
            Command::new("cmd").args(["/C", command]).output()
        } else {
            Command::new("sh").args(["-c", command]).output()
        };

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                error!("Error executing command '{}': {}", command, e);
                return None;
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        let mut combined = stdout.clone();
        if !stderr.is_empty() {
            combined.push_str(&format!("\nSTDERR: {}", stderr));
        }

        if combined.is_empty() || !self.should_collect(&combined) {
            return None;
        }

        Some(LogEvent::new(
            "command_output",
            self.host.clone(),
            format!("Command: {}\nOutput:\n{}", command, combined),
            json!({
                "command": command,
                "stdout": stdout,
                "stderr": stderr,
            }),
        ))
    }
}

impl Collector for CommandCollector {
    fn name(&self) -> &'static str {
        "command"
    }

    fn filters(&self) -> &[String] {
        &self.filters
    }

    fn collect(
        &mut self,
        events: &Sender<LogEvent>,
        shutdown: &ShutdownFlag,
    ) -> Result<(), CollectorError> {
        let Some(command) = self.command.clone() else {
            error!("Command collector requires 'command' in config");
            return Ok(());
        };

        while !shutdown.is_triggered() {
            if let Some(event) = self.probe(&command) {
                if events.send(event).is_err() {
                    break;
                }
            }

            if !shutdown.sleep_while_active(self.interval) {
                break;
            }
        }

        Ok(())
    }
}

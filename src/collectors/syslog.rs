//! Tail-style collector for the system syslog file
//!
//! Same loop as the file tail collector with its own source tag and a
//! `/var/log/syslog` default path. Skipped at runtime on Windows.

use crate::collectors::file_tail::tail_lines;
use crate::collectors::Collector;
use crate::error::CollectorError;
use crate::events::{hostname, LogEvent};
use crate::shutdown::ShutdownFlag;
use log::warn;
use serde_json::json;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Duration;

const DEFAULT_SYSLOG_PATH: &str = "/var/log/syslog";

/// Collector that tails the syslog file
pub struct SyslogCollector {
    path: PathBuf,
    interval: Duration,
    filters: Vec<String>,
    host: String,
}

impl SyslogCollector {
    pub fn new(config: &crate::config::SourceConfig) -> Self {
        let path = config
            .path
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSLOG_PATH.to_string());
        Self {
            path: PathBuf::from(path),
            interval: config.interval_or(0.1),
            filters: config.filters.clone(),
            host: hostname(),
        }
    }
}

impl Collector for SyslogCollector {
    fn name(&self) -> &'static str {
        "linux_syslog"
    }

    fn filters(&self) -> &[String] {
        &self.filters
    }

    fn collect(
        &mut self,
        events: &Sender<LogEvent>,
        shutdown: &ShutdownFlag,
    ) -> Result<(), CollectorError> {
        if cfg!(target_os = "windows") {
            warn!("Syslog collector is not supported on Windows, skipping");
            return Ok(());
        }

        let path = self.path.clone();
        let host = self.host.clone();
        let path_str = path.display().to_string();
        tail_lines(&path, self.interval, events, shutdown, |message| {
            if self.should_collect(message) {
                Some(LogEvent::new(
                    "linux_syslog",
                    host.clone(),
                    message,
                    json!({ "path": path_str.clone() }),
                ))
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use std::io::Write;
    use std::sync::mpsc;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_to_system_syslog_path() {
        let collector = SyslogCollector::new(&SourceConfig {
            kind: "linux_syslog".to_string(),
            ..SourceConfig::default()
        });
        assert_eq!(collector.path, PathBuf::from(DEFAULT_SYSLOG_PATH));
    }

    #[test]
    #[cfg(unix)]
    fn test_tails_configured_path_with_syslog_source_type() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("syslog");
        std::fs::write(&path, "").unwrap();

        let mut collector = SyslogCollector::new(&SourceConfig {
            kind: "linux_syslog".to_string(),
            path: Some(path.display().to_string()),
            interval: Some(0.02),
            ..SourceConfig::default()
        });

        let (tx, rx) = mpsc::channel();
        let shutdown = ShutdownFlag::new();
        let flag = shutdown.clone();
        let handle = thread::spawn(move || collector.collect(&tx, &flag));

        thread::sleep(Duration::from_millis(200));
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "kernel: something happened").unwrap();
        file.flush().unwrap();

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event.source_type, "linux_syslog");
        assert_eq!(event.message, "kernel: something happened");
        assert_eq!(
            event.raw_data["path"],
            serde_json::json!(path.display().to_string())
        );

        shutdown.trigger();
        handle.join().unwrap().unwrap();
    }
}

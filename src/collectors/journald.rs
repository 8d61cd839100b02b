//! Stream-style collector for the systemd journal
//!
//! Attaches to `journalctl -f -o json` and parses each line as a structured
//! journal record. Malformed records are skipped silently; end-of-input
//! terminates the collector (the one variant allowed to terminate on its
//! own). The subprocess stdout is switched to non-blocking mode so the read
//! loop observes cancellation between chunks.

use crate::collectors::Collector;
use crate::error::CollectorError;
use crate::events::{hostname, LogEvent};
use crate::shutdown::ShutdownFlag;
use log::{debug, error, warn};
use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc::Sender;
use std::time::Duration;

/// Collector that follows the systemd journal
pub struct JournaldCollector {
    filters: Vec<String>,
    host: String,
    child: Option<Child>,
}

impl JournaldCollector {
    pub fn new(config: &crate::config::SourceConfig) -> Self {
        Self {
            filters: config.filters.clone(),
            host: hostname(),
            child: None,
        }
    }

    /// Spawn the journal follower subprocess
    fn spawn_journalctl() -> Result<Child, CollectorError> {
        let mut child = Command::new("journalctl")
            .args(["-f", "-o", "json"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CollectorError::SubprocessSpawn(format!("journalctl: {}", e)))?;

        // Non-blocking stdout so reads return instead of pinning the thread
        // past a shutdown request
        if let Some(ref stdout) = child.stdout {
            #[cfg(unix)]
            {
                use std::os::unix::io::AsRawFd;
                let fd = stdout.as_raw_fd();
                unsafe {
                    let flags = libc::fcntl(fd, libc::F_GETFL);
                    libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
                }
            }
        }

        Ok(child)
    }

    /// Parse one journal line into an event, applying the filter gate
    ///
    /// Returns `None` for malformed records and filtered-out messages.
    fn parse_line(&self, line: &str) -> Option<LogEvent> {
        let record: serde_json::Value = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                debug!("Skipping malformed journal record: {}", e);
                return None;
            }
        };

        let message = record
            .get("MESSAGE")
            .and_then(|m| m.as_str())
            .unwrap_or("")
            .to_string();

        if !self.should_collect(&message) {
            return None;
        }

        Some(LogEvent::new(
            "linux_journald",
            self.host.clone(),
            message,
            record,
        ))
    }

    /// Read the follow stream until end-of-input or cancellation
    fn stream_events(
        &self,
        mut stdout: ChildStdout,
        events: &Sender<LogEvent>,
        shutdown: &ShutdownFlag,
    ) -> Result<(), CollectorError> {
        let mut buffer = String::new();
        let mut chunk = [0u8; 4096];

        loop {
            if shutdown.is_triggered() {
                return Ok(());
            }

            match stdout.read(&mut chunk) {
                Ok(0) => {
                    debug!("Journal stream ended");
                    return Ok(());
                }
                Ok(n) => {
                    buffer.push_str(&String::from_utf8_lossy(&chunk[..n]));

                    while let Some(newline) = buffer.find('\n') {
                        let line = buffer[..newline].to_string();
                        buffer.drain(..=newline);

                        if line.trim().is_empty() {
                            continue;
                        }
                        if let Some(event) = self.parse_line(&line) {
                            if events.send(event).is_err() {
                                debug!("Event channel closed, stopping journal stream");
                                return Ok(());
                            }
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    error!("Error reading journal stream: {}", e);
                    return Ok(());
                }
            }
        }
    }
}

impl Collector for JournaldCollector {
    fn name(&self) -> &'static str {
        "linux_journald"
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
            warn!("Journald collector is not supported on Windows, skipping");
            return Ok(());
        }

        let mut child = Self::spawn_journalctl()?;
        let stdout = child.stdout.take().ok_or_else(|| {
            CollectorError::SubprocessTerminated("journalctl stdout unavailable".to_string())
        })?;
        self.child = Some(child);

        self.stream_events(stdout, events, shutdown)
    }

    fn close(&mut self) -> Result<(), CollectorError> {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use std::sync::mpsc;

    fn collector(filters: Vec<String>) -> JournaldCollector {
        JournaldCollector::new(&SourceConfig {
            kind: "linux_journald".to_string(),
            filters,
            ..SourceConfig::default()
        })
    }

    #[test]
    fn test_parse_line_extracts_message_and_keeps_record() {
        let line = r#"{"MESSAGE": "unit started", "_SYSTEMD_UNIT": "cron.service", "PRIORITY": "6"}"#;
        let event = collector(vec![]).parse_line(line).unwrap();

        assert_eq!(event.source_type, "linux_journald");
        assert_eq!(event.message, "unit started");
        assert_eq!(event.raw_data["_SYSTEMD_UNIT"], "cron.service");
        assert_eq!(event.raw_data["PRIORITY"], "6");
    }

    #[test]
    fn test_parse_line_skips_malformed_records() {
        assert!(collector(vec![]).parse_line("not json at all").is_none());
        assert!(collector(vec![]).parse_line("{\"MESSAGE\": ").is_none());
    }

    #[test]
    fn test_parse_line_applies_filter_gate() {
        let c = collector(vec!["ssh".to_string()]);
        assert!(c
            .parse_line(r#"{"MESSAGE": "sshd session opened"}"#)
            .is_some());
        assert!(c.parse_line(r#"{"MESSAGE": "cron job ran"}"#).is_none());
    }

    #[test]
    fn test_parse_line_tolerates_missing_message_field() {
        // A record without MESSAGE still yields an (empty-message) event
        // when no filters are configured
        let event = collector(vec![]).parse_line(r#"{"PRIORITY": "3"}"#).unwrap();
        assert_eq!(event.message, "");
    }

    #[test]
    #[cfg(unix)]
    fn test_stream_events_with_mock_subprocess() {
        let (tx, rx) = mpsc::channel();
        let shutdown = ShutdownFlag::new();

        let mut child = Command::new("echo")
            .arg(concat!(
                r#"{"MESSAGE": "valid one"}"#,
                "\n",
                "garbage line",
                "\n",
                r#"{"MESSAGE": "valid two"}"#,
            ))
            .stdout(Stdio::piped())
            .spawn()
            .expect("failed to spawn echo");
        let stdout = child.stdout.take().unwrap();

        let c = collector(vec![]);
        c.stream_events(stdout, &tx, &shutdown).unwrap();

        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(first.message, "valid one");
        assert_eq!(second.message, "valid two");

        // The malformed middle line produced nothing
        assert!(rx.try_recv().is_err());

        let _ = child.wait();
    }

    #[test]
    fn test_close_without_start_is_a_no_op() {
        let mut c = collector(vec![]);
        assert!(c.close().is_ok());
        assert!(c.close().is_ok());
    }
}

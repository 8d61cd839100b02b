//! Tail-style collector for plain text files
//!
//! Opens the target file positioned at its current end and polls for newly
//! appended lines. Transient read gaps never terminate the loop; a file that
//! does not exist yet is waited for on a longer fixed interval.

use crate::collectors::Collector;
use crate::error::CollectorError;
use crate::events::{hostname, LogEvent};
use crate::shutdown::ShutdownFlag;
use log::{debug, error, warn};
use serde_json::json;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;

/// How long to wait between existence checks for a file that is not there yet
const MISSING_FILE_RETRY: Duration = Duration::from_secs(1);

/// Collector that tails a single text file
pub struct FileTailCollector {
    path: Option<PathBuf>,
    interval: Duration,
    filters: Vec<String>,
    host: String,
}

impl FileTailCollector {
    /// Create a collector from its source configuration
    ///
    /// `path` is required; a missing path is reported when the collect loop
    /// starts and ends this collector without affecting the run. The poll
    /// interval defaults to 100ms.
    pub fn new(config: &crate::config::SourceConfig) -> Self {
        Self {
            path: config.path.clone().map(PathBuf::from),
            interval: config.interval_or(0.1),
            filters: config.filters.clone(),
            host: hostname(),
        }
    }
}

impl Collector for FileTailCollector {
    fn name(&self) -> &'static str {
        "file_tail"
    }

    fn filters(&self) -> &[String] {
        &self.filters
    }

    fn collect(
        &mut self,
        events: &Sender<LogEvent>,
        shutdown: &ShutdownFlag,
    ) -> Result<(), CollectorError> {
        let Some(path) = self.path.clone() else {
            error!("File tail collector requires 'path' in config");
            return Ok(());
        };

        let host = self.host.clone();
        let path_str = path.display().to_string();
        tail_lines(&path, self.interval, events, shutdown, |message| {
            if self.should_collect(message) {
                Some(LogEvent::new(
                    "file_tail",
                    host.clone(),
                    message,
                    json!({ "file_path": path_str.clone() }),
                ))
            } else {
                None
            }
        })
    }
}

/// Shared tail loop used by the file and syslog collectors
///
/// Calls `emit` for every non-empty appended line; an `emit` returning `None`
/// means the line was filtered out. Returns when the shutdown flag is
/// triggered or the event channel closes.
pub(crate) fn tail_lines<F>(
    path: &Path,
    interval: Duration,
    events: &Sender<LogEvent>,
    shutdown: &ShutdownFlag,
    mut emit: F,
) -> Result<(), CollectorError>
where
    F: FnMut(&str) -> Option<LogEvent>,
{
    if !path.exists() {
        warn!(
            "File {} does not exist yet, waiting for it to appear",
            path.display()
        );
        while !path.exists() {
            if !shutdown.sleep_while_active(MISSING_FILE_RETRY) {
                return Ok(());
            }
        }
    }

    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    // Tail from the current end; existing content is not replayed
    reader.seek(SeekFrom::End(0))?;

    let mut line = String::new();
    loop {
        if shutdown.is_triggered() {
            return Ok(());
        }

        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => {
                // No new data yet
                if !shutdown.sleep_while_active(interval) {
                    return Ok(());
                }
            }
            Ok(_) => {
                let message = line.trim();
                if message.is_empty() {
                    continue;
                }
                if let Some(event) = emit(message) {
                    if events.send(event).is_err() {
                        debug!("Event channel closed, stopping tail of {}", path.display());
                        return Ok(());
                    }
                }
            }
            Err(e) => {
                error!("Error reading {}: {}", path.display(), e);
                if !shutdown.sleep_while_active(interval) {
                    return Ok(());
                }
            }
        }
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

    fn source(path: &Path, filters: Vec<String>) -> SourceConfig {
        SourceConfig {
            kind: "file".to_string(),
            path: Some(path.display().to_string()),
            interval: Some(0.02),
            filters,
            ..SourceConfig::default()
        }
    }

    fn run_tail(
        mut collector: FileTailCollector,
    ) -> (
        mpsc::Receiver<LogEvent>,
        ShutdownFlag,
        thread::JoinHandle<Result<(), CollectorError>>,
    ) {
        let (tx, rx) = mpsc::channel();
        let shutdown = ShutdownFlag::new();
        let flag = shutdown.clone();
        let handle = thread::spawn(move || collector.collect(&tx, &flag));
        (rx, shutdown, handle)
    }

    #[test]
    fn test_tail_picks_up_appended_lines_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "old line that must not be replayed\n").unwrap();

        let collector = FileTailCollector::new(&source(&path, vec![]));
        let (rx, shutdown, handle) = run_tail(collector);

        // Give the tail time to open and position at the end
        thread::sleep(Duration::from_millis(200));

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        for message in ["first", "second", "third"] {
            writeln!(file, "{}", message).unwrap();
            file.flush().unwrap();
            thread::sleep(Duration::from_millis(10));
        }

        let mut received = Vec::new();
        for _ in 0..3 {
            let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            received.push(event);
        }

        shutdown.trigger();
        handle.join().unwrap().unwrap();

        let messages: Vec<&str> = received.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
        for event in &received {
            assert_eq!(event.source_type, "file_tail");
            assert_eq!(
                event.raw_data["file_path"],
                serde_json::json!(path.display().to_string())
            );
        }
    }

    #[test]
    fn test_tail_applies_filters_before_yielding() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "").unwrap();

        let collector = FileTailCollector::new(&source(&path, vec!["ERROR".to_string()]));
        let (rx, shutdown, handle) = run_tail(collector);

        thread::sleep(Duration::from_millis(200));

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "INFO routine message").unwrap();
        writeln!(file, "ERROR something broke").unwrap();
        file.flush().unwrap();

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event.message, "ERROR something broke");

        // The filtered-out line never arrives
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        shutdown.trigger();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_tail_waits_for_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.log");

        let collector = FileTailCollector::new(&source(&path, vec![]));
        let (rx, shutdown, handle) = run_tail(collector);

        // File appears only after the collector started waiting
        thread::sleep(Duration::from_millis(300));
        std::fs::write(&path, "").unwrap();
        thread::sleep(Duration::from_millis(1200));

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "born late").unwrap();
        file.flush().unwrap();

        let event = rx.recv_timeout(Duration::from_secs(3)).unwrap();
        assert_eq!(event.message, "born late");

        shutdown.trigger();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_missing_path_config_ends_collector_cleanly() {
        let config = SourceConfig {
            kind: "file".to_string(),
            ..SourceConfig::default()
        };
        let mut collector = FileTailCollector::new(&config);

        let (tx, _rx) = mpsc::channel();
        let shutdown = ShutdownFlag::new();
        assert!(collector.collect(&tx, &shutdown).is_ok());
    }

    #[test]
    fn test_shutdown_interrupts_missing_file_wait() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("never.log");

        let collector = FileTailCollector::new(&source(&path, vec![]));
        let (_rx, shutdown, handle) = run_tail(collector);

        thread::sleep(Duration::from_millis(100));
        shutdown.trigger();

        // Unwinds promptly from the missing-file wait
        handle.join().unwrap().unwrap();
    }
}

//! Poller-style collector for the Windows event log
//!
//! Queries the event log once per interval through the platform query tool
//! (`powershell Get-WinEvent` with JSON output) and tracks a monotonically
//! advancing record-id cursor so each record is reported at most once across
//! cycles. A transient cycle error is logged and the poller backs off to a
//! longer interval before retrying. If the record index regresses between
//! polls (log cleared or rotated) the cursor resynchronizes to the current
//! end instead of re-reporting the whole log.

use crate::collectors::Collector;
use crate::error::CollectorError;
use crate::events::{hostname, LogEvent};
use crate::shutdown::ShutdownFlag;
use log::{error, warn};
use serde_json::json;
use std::process::Command;
use std::sync::mpsc::Sender;
use std::time::Duration;

/// Backoff applied after a failed probe cycle
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Collector that polls a Windows event log
pub struct EventLogCollector {
    log_type: String,
    server: Option<String>,
    source_type: String,
    interval: Duration,
    filters: Vec<String>,
    host: String,
    cursor: u64,
}

impl EventLogCollector {
    /// Create a collector from its source configuration
    ///
    /// `log_type` defaults to "Application"; the poll interval defaults
    /// to 1s.
    pub fn new(config: &crate::config::SourceConfig) -> Self {
        let log_type = config
            .log_type
            .clone()
            .unwrap_or_else(|| "Application".to_string());
        Self {
            source_type: format!("windows_evtx_{}", log_type),
            log_type,
            server: config.server.clone(),
            interval: config.interval_or(1.0),
            filters: config.filters.clone(),
            host: hostname(),
            cursor: 0,
        }
    }

    /// Run one event-log query through the platform query tool
    fn run_query(&self, script: &str) -> Result<String, CollectorError> {
        let output = Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", script])
            .output()
            .map_err(|e| CollectorError::SubprocessSpawn(format!("powershell: {}", e)))?;

        // Get-WinEvent exits non-zero when no records match; an empty stdout
        // is a normal zero-event cycle, not a failure
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Clause selecting a remote machine, when one is configured
    fn computer_clause(&self) -> String {
        match self.server.as_deref() {
            Some(server) if server != "localhost" => format!(" -ComputerName '{}'", server),
            _ => String::new(),
        }
    }

    /// Record id of the newest record currently in the log
    fn newest_record_id(&self) -> Result<Option<u64>, CollectorError> {
        let script = format!(
            "Get-WinEvent -LogName '{}'{} -MaxEvents 1 | Select-Object -ExpandProperty RecordId",
            self.log_type,
            self.computer_clause(),
        );
        let stdout = self.run_query(&script)?;
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed
            .parse::<u64>()
            .map(Some)
            .map_err(|e| CollectorError::ParseError(format!("record id '{}': {}", trimmed, e)))
    }

    /// Query records appended since the cursor, oldest first
    fn query_since_cursor(&self) -> Result<Vec<serde_json::Value>, CollectorError> {
        let script = format!(
            "Get-WinEvent -LogName '{}'{} -Oldest -FilterXPath '*[System[EventRecordID > {}]]' \
             | Select-Object RecordId, Id, ProviderName, LevelDisplayName, Message \
             | ConvertTo-Json -Depth 4",
            self.log_type,
            self.computer_clause(),
            self.cursor,
        );
        let stdout = self.run_query(&script)?;
        parse_batch(&stdout)
    }

    /// Advance the cursor over a batch and build events for records that
    /// pass the filter gate
    ///
    /// The cursor advances over every record, filtered or not, so a record
    /// is considered at most once.
    fn events_from_batch(&mut self, records: Vec<serde_json::Value>) -> Vec<LogEvent> {
        let mut events = Vec::new();

        for record in records {
            let Some(record_id) = record.get("RecordId").and_then(|id| id.as_u64()) else {
                continue;
            };
            if record_id <= self.cursor {
                continue;
            }
            self.cursor = record_id;

            let event_id = record.get("Id").and_then(|id| id.as_u64()).unwrap_or(0);
            let provider = record
                .get("ProviderName")
                .and_then(|p| p.as_str())
                .unwrap_or("unknown");
            let level = record.get("LevelDisplayName").and_then(|l| l.as_str());
            let detail = record.get("Message").and_then(|m| m.as_str());

            let mut message = format!("EventID {} from {}", event_id, provider);
            if let Some(detail) = detail {
                if !detail.is_empty() {
                    message.push_str(": ");
                    message.push_str(detail);
                }
            }

            if !self.should_collect(&message) {
                continue;
            }

            events.push(LogEvent::new(
                self.source_type.clone(),
                self.host.clone(),
                message,
                json!({
                    "record_number": record_id,
                    "event_id": event_id,
                    "provider": provider,
                    "level": level,
                    "log_type": self.log_type.clone(),
                }),
            ));
        }

        events
    }
}

/// Normalize the query tool's JSON output into a list of records
///
/// A single matching record serializes as a bare object, several as an
/// array; an empty output is a zero-event cycle.
fn parse_batch(stdout: &str) -> Result<Vec<serde_json::Value>, CollectorError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let value: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| CollectorError::ParseError(format!("event log batch: {}", e)))?;

    match value {
        serde_json::Value::Array(records) => Ok(records),
        record @ serde_json::Value::Object(_) => Ok(vec![record]),
        other => Err(CollectorError::ParseError(format!(
            "unexpected event log batch shape: {}",
            other
        ))),
    }
}

impl Collector for EventLogCollector {
    fn name(&self) -> &'static str {
        "windows_evtx"
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
            warn!("Event log collector is only supported on Windows, skipping");
            return Ok(());
        }

        // Position the cursor at the current end; existing records are not
        // replayed
        match self.newest_record_id() {
            Ok(Some(newest)) => self.cursor = newest,
            Ok(None) => self.cursor = 0,
            Err(e) => error!("Failed to read initial event log position: {}", e),
        }

        while !shutdown.is_triggered() {
            match self.query_since_cursor() {
                Ok(records) => {
                    if records.is_empty() {
                        // A quiet cycle is also where a cleared/rotated log
                        // shows up: the newest id falls below the cursor
                        if let Ok(Some(newest)) = self.newest_record_id() {
                            if newest < self.cursor {
                                warn!(
                                    "Event log '{}' record index regressed ({} -> {}), resynchronizing cursor",
                                    self.log_type, self.cursor, newest
                                );
                                self.cursor = newest;
                            }
                        }
                    } else {
                        for event in self.events_from_batch(records) {
                            if events.send(event).is_err() {
                                return Ok(());
                            }
                        }
                    }

                    if !shutdown.sleep_while_active(self.interval) {
                        break;
                    }
                }
                Err(e) => {
                    error!("Error reading event log '{}': {}", self.log_type, e);
                    if !shutdown.sleep_while_active(ERROR_BACKOFF) {
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

//! Core event type for the log collection agent
//!
//! This module defines the normalized record every collector produces and
//! every sink consumes, plus the process-identity helpers collectors use to
//! stamp events.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::env;

/// Timestamp type for consistent time handling across the application
///
/// Timestamps are local time with offset, matching the wire form contract.
pub type Timestamp = DateTime<Local>;

/// Normalized log event
///
/// Represents a single collected record, regardless of which source produced
/// it. Events are immutable once constructed; `to_json` is the canonical wire
/// form used by every sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEvent {
    /// When the collector yielded the event
    pub timestamp: Timestamp,
    /// Which collector sub-kind produced it (e.g. "file_tail", "linux_journald")
    pub source_type: String,
    /// Machine identity, resolved once per collector at construction
    pub host: String,
    /// Human-readable rendering of the event
    pub message: String,
    /// Source-specific structured detail not captured by `message`
    pub raw_data: serde_json::Value,
}

impl LogEvent {
    /// Create a new event stamped with the current local time
    pub fn new(
        source_type: impl Into<String>,
        host: impl Into<String>,
        message: impl Into<String>,
        raw_data: serde_json::Value,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            source_type: source_type.into(),
            host: host.into(),
            message: message.into(),
            raw_data,
        }
    }

    /// Serialize the event to its JSON wire form
    ///
    /// The wire form is a JSON object with exactly the fields `timestamp`,
    /// `source_type`, `host`, `message` and `raw_data`. Consumers must not
    /// rely on key order.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Resolve the machine hostname once per collector construction
///
/// Tries the HOSTNAME environment variable first (commonly set in containers),
/// then COMPUTERNAME on Windows, then the gethostname(2) syscall on Unix.
/// Falls back to "unknown" rather than failing; an agent without a resolvable
/// hostname still collects.
pub fn hostname() -> String {
    if let Ok(name) = env::var("HOSTNAME") {
        if !name.is_empty() {
            return name;
        }
    }

    if let Ok(name) = env::var("COMPUTERNAME") {
        if !name.is_empty() {
            return name;
        }
    }

    #[cfg(unix)]
    {
        let mut buf = [0u8; 256];
        let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
        if rc == 0 {
            let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
            if let Ok(name) = std::str::from_utf8(&buf[..end]) {
                if !name.is_empty() {
                    return name.to_string();
                }
            }
        }
    }

    "unknown".to_string()
}

/// Resolve the effective user for the startup metadata event
pub fn username() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

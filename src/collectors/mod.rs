//! Event collectors
//!
//! A collector wraps one external source and pushes normalized events into
//! the pipeline channel. Each collector runs on its own thread with the
//! lifecycle `start -> collect -> close`; `close` is invoked exactly once per
//! run, even when `start` or `collect` fail.

use crate::error::CollectorError;
use crate::events::LogEvent;
use crate::shutdown::ShutdownFlag;
use std::sync::mpsc::Sender;

/// Tail collector for plain text files
pub mod file_tail;

/// Tail collector for the system syslog file
pub mod syslog;

/// Stream collector for the systemd journal
pub mod journald;

/// Poller collector for periodic command output
pub mod command;

/// Poller collector for the Windows event log
pub mod event_log;

/// Poller collector for Windows registry values
pub mod registry;

pub use command::CommandCollector;
pub use event_log::EventLogCollector;
pub use file_tail::FileTailCollector;
pub use journald::JournaldCollector;
pub use registry::RegistryCollector;
pub use syslog::SyslogCollector;

/// Contract every event source implements
///
/// The pipeline holds collectors only through this trait. `collect` runs the
/// source's read loop, applying the filter gate before sending each event,
/// until the shutdown flag is triggered at a suspension point. Only the
/// journald collector may return from `collect` on its own, at stream
/// end-of-input; every other variant treats per-cycle failures as non-fatal
/// and keeps looping.
pub trait Collector: Send {
    /// Short name used in log lines
    fn name(&self) -> &'static str;

    /// Configured substring filters
    fn filters(&self) -> &[String];

    /// Filter gate applied before yielding an event
    ///
    /// With no filters configured every message passes; otherwise a message
    /// passes iff it contains at least one filter as a literal,
    /// case-sensitive substring.
    fn should_collect(&self, message: &str) -> bool {
        let filters = self.filters();
        filters.is_empty() || filters.iter().any(|f| message.contains(f.as_str()))
    }

    /// One-time initialization before the collect loop
    ///
    /// # Errors
    ///
    /// An error here is the one unrecoverable failure class a collector may
    /// report; it ends this collector without affecting the rest of the run.
    fn start(&mut self) -> Result<(), CollectorError> {
        Ok(())
    }

    /// Run the collect-and-forward loop until cancelled
    fn collect(
        &mut self,
        events: &Sender<LogEvent>,
        shutdown: &ShutdownFlag,
    ) -> Result<(), CollectorError>;

    /// Release source handles; safe to call after any failure
    fn close(&mut self) -> Result<(), CollectorError> {
        Ok(())
    }
}


#[cfg(test)]
mod property_tests {
    use super::tests::probe;
    use super::Collector;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn prop_no_filters_always_collects(message: String) -> bool {
        probe(vec![]).should_collect(&message)
    }

    #[quickcheck]
    fn prop_message_containing_a_filter_always_collects(
        prefix: String,
        filter: String,
        suffix: String,
    ) -> bool {
        let message = format!("{}{}{}", prefix, filter, suffix);
        probe(vec![filter]).should_collect(&message)
    }

    #[quickcheck]
    fn prop_collect_decision_matches_substring_search(
        filters: Vec<String>,
        message: String,
    ) -> bool {
        let expected = filters.is_empty() || filters.iter().any(|f| message.contains(f));
        probe(filters).should_collect(&message) == expected
    }
}

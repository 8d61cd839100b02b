//! Output sinks
//!
//! A sink delivers normalized events to one external destination. Sinks are
//! owned exclusively by the pipeline's fan-out loop, so every `write` runs
//! to completion before the next one starts and no two events' bytes can
//! interleave at a destination.

use crate::error::SinkError;
use crate::events::LogEvent;

/// Sink writing one line per event to standard output
pub mod stdout;

/// Sink appending events to a file with an integrity manifest
pub mod file;

/// Sink POSTing each event to an HTTP endpoint
pub mod http;

pub use file::FileSink;
pub use http::HttpSink;
pub use stdout::StdoutSink;

/// Contract every event destination implements
///
/// The pipeline holds sinks only through this trait. A failed `write` must
/// surface an error rather than silently dropping the event; the pipeline
/// logs it and continues with the remaining sinks.
#[cfg_attr(test, mockall::automock)]
pub trait Sink: Send {
    /// Short name used in log lines
    fn name(&self) -> &'static str;

    /// One-time initialization before the first write
    fn start(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Deliver one event; runs to completion before the caller proceeds
    fn write(&mut self, event: &LogEvent) -> Result<(), SinkError>;

    /// Flush and release resources; idempotent
    fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

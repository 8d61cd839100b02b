//! Console sink
//!
//! Writes one JSON line per event to standard output and flushes after each
//! write. Holds no other state.

use crate::error::SinkError;
use crate::events::LogEvent;
use crate::sinks::Sink;
use std::io::Write;

/// Sink printing events as JSON lines on stdout
#[derive(Debug, Default)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        Self
    }
}

impl Sink for StdoutSink {
    fn name(&self) -> &'static str {
        "stdout"
    }

    fn write(&mut self, event: &LogEvent) -> Result<(), SinkError> {
        let line = event.to_json()?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        stdout.flush()?;
        Ok(())
    }
}

//! Pipeline orchestration
//!
//! Wires N collectors to M sinks for one run: starts every sink, emits the
//! startup metadata event, runs one thread per collector, fans every
//! collected event out to all sinks in configured order, and drives the
//! coordinated shutdown. Collector threads push events into a single mpsc
//! channel; the fan-out loop owns the sinks exclusively, so each `write`
//! runs to completion before the next and per-collector event order is
//! preserved end to end.

use crate::collectors::{
    Collector, CommandCollector, EventLogCollector, FileTailCollector, JournaldCollector,
    RegistryCollector, SyslogCollector,
};
use crate::config::{Config, SinkConfig, SourceConfig};
use crate::error::{ConfigError, SinkError};
use crate::events::{hostname, username, LogEvent};
use crate::shutdown::ShutdownFlag;
use crate::sinks::{FileSink, HttpSink, Sink, StdoutSink};
use log::{debug, error, info, warn};
use serde_json::json;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

/// One collection run: collectors, sinks and the shared shutdown signal
pub struct Pipeline {
    collectors: Vec<Box<dyn Collector>>,
    sinks: Vec<Box<dyn Sink>>,
    shutdown: ShutdownFlag,
    config_path: String,
}

impl Pipeline {
    /// Assemble a pipeline from already-built collectors and sinks
    ///
    /// # Errors
    ///
    /// Refuses to start with zero sinks or zero collectors; this is the
    /// fatal configuration class and is reported before any resource opens.
    pub fn new(
        collectors: Vec<Box<dyn Collector>>,
        sinks: Vec<Box<dyn Sink>>,
        config_path: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        if sinks.is_empty() {
            return Err(ConfigError::ValidationError(
                "No valid sinks configured".to_string(),
            ));
        }
        if collectors.is_empty() {
            return Err(ConfigError::ValidationError(
                "No valid sources configured".to_string(),
            ));
        }

        Ok(Self {
            collectors,
            sinks,
            shutdown: ShutdownFlag::new(),
            config_path: config_path.into(),
        })
    }

    /// Build collectors and sinks from the resolved configuration
    ///
    /// Entries with an unrecognized `type` are skipped with a warning;
    /// ending up with zero of either is fatal.
    pub fn from_config(config: &Config, config_path: &str) -> Result<Self, ConfigError> {
        let sinks = build_sinks(&config.sinks);
        let collectors = build_collectors(&config.sources);
        Self::new(collectors, sinks, config_path)
    }

    /// Handle used to request shutdown from a signal handler or test
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    pub fn collector_count(&self) -> usize {
        self.collectors.len()
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Run the pipeline to completion
    ///
    /// Blocks until every collector has unwound (after the shutdown flag is
    /// triggered, or on its own for stream collectors) and all buffered
    /// events have been delivered, then closes every sink exactly once in
    /// configured order.
    ///
    /// # Errors
    ///
    /// Returns the first sink startup failure; in that case no collector
    /// was started.
    pub fn run(mut self) -> Result<(), SinkError> {
        info!(
            "Starting pipeline with {} collectors and {} sinks",
            self.collectors.len(),
            self.sinks.len()
        );

        // Start sinks in configured order; the first failure aborts the run
        // before any collector starts
        for sink in &mut self.sinks {
            sink.start()?;
        }

        let metadata = metadata_event(&self.config_path);
        self.dispatch(&metadata);

        let (sender, receiver) = mpsc::channel::<LogEvent>();
        let mut handles = Vec::new();
        for collector in std::mem::take(&mut self.collectors) {
            let events = sender.clone();
            let shutdown = self.shutdown.clone();
            handles.push(thread::spawn(move || {
                run_collector(collector, events, shutdown);
            }));
        }
        // The fan-out loop ends when every collector thread has dropped its
        // sender and the channel has drained
        drop(sender);

        loop {
            match receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => self.dispatch(&event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        for handle in handles {
            if handle.join().is_err() {
                error!("Collector thread panicked");
            }
        }

        self.close_sinks();
        info!("Pipeline stopped");
        Ok(())
    }

    /// Fan one event out to every sink in configured order
    ///
    /// Each write completes before the next sink is offered the event; a
    /// failing sink is logged and the remaining sinks still receive it.
    fn dispatch(&mut self, event: &LogEvent) {
        for sink in &mut self.sinks {
            if let Err(e) = sink.write(event) {
                error!("Failed to write event to {} sink: {}", sink.name(), e);
            }
        }
    }

    /// Close every sink exactly once, in configured order
    fn close_sinks(&mut self) {
        info!("Closing sinks...");
        for sink in &mut self.sinks {
            if let Err(e) = sink.close() {
                error!("Failed to close {} sink: {}", sink.name(), e);
            }
        }
    }
}

/// Lifecycle of one collector thread: start, collect, close
///
/// `close` runs exactly once per collector, whether `start` failed,
/// `collect` errored, or the loop unwound on cancellation.
fn run_collector(
    mut collector: Box<dyn Collector>,
    events: Sender<LogEvent>,
    shutdown: ShutdownFlag,
) {
    let name = collector.name();
    info!("Starting {} collector", name);

    match collector.start() {
        Ok(()) => {
            if let Err(e) = collector.collect(&events, &shutdown) {
                error!("{} collector stopped with error: {}", name, e);
            }
        }
        Err(e) => error!("Failed to start {} collector: {}", name, e),
    }

    if let Err(e) = collector.close() {
        error!("Failed to close {} collector: {}", name, e);
    }
    debug!("{} collector finished", name);
}

/// Synthetic "collection started" event written to every sink at startup
fn metadata_event(config_path: &str) -> LogEvent {
    let start_time = chrono::Local::now();
    LogEvent {
        timestamp: start_time,
        source_type: "magpie_metadata".to_string(),
        host: hostname(),
        message: "Magpie collection started".to_string(),
        raw_data: json!({
            "version": env!("CARGO_PKG_VERSION"),
            "user": username(),
            "start_time": start_time.to_rfc3339(),
            "config_file": config_path,
        }),
    }
}

fn build_collectors(configs: &[SourceConfig]) -> Vec<Box<dyn Collector>> {
    let mut collectors: Vec<Box<dyn Collector>> = Vec::new();
    for config in configs {
        match config.kind.as_str() {
            "file" => collectors.push(Box::new(FileTailCollector::new(config))),
            "linux_syslog" => collectors.push(Box::new(SyslogCollector::new(config))),
            "linux_journald" => collectors.push(Box::new(JournaldCollector::new(config))),
            "command" => collectors.push(Box::new(CommandCollector::new(config))),
            "windows_evtx" => collectors.push(Box::new(EventLogCollector::new(config))),
            "windows_registry" => collectors.push(Box::new(RegistryCollector::new(config))),
            other => warn!("Unknown source type '{}'", other),
        }
    }
    collectors
}

fn build_sinks(configs: &[SinkConfig]) -> Vec<Box<dyn Sink>> {
    let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
    for config in configs {
        match config.kind.as_str() {
            "stdout" => sinks.push(Box::new(StdoutSink::new())),
            "file" => sinks.push(Box::new(FileSink::new(config))),
            "http" => match HttpSink::new(config) {
                Ok(sink) => sinks.push(Box::new(sink)),
                Err(e) => warn!("Skipping http sink: {}", e),
            },
            other => warn!("Unknown sink type '{}'", other),
        }
    }
    sinks
}

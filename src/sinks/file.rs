//! File sink with integrity manifest
//!
//! Appends one JSON line per event, flushing after every write, and keeps a
//! streaming SHA-256 over exactly the bytes written in write order. On close
//! it records the final digest in a sibling `<path>.manifest` file; re-hashing
//! the output file at any later time must reproduce that digest.

use crate::error::SinkError;
use crate::events::LogEvent;
use crate::sinks::Sink;
use log::info;
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

const DEFAULT_OUTPUT_PATH: &str = "output.json";

/// Sink appending events to a file and attesting its content hash
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
    hasher: Sha256,
}

impl FileSink {
    /// Create a sink from its configuration; the file opens lazily
    pub fn new(config: &crate::config::SinkConfig) -> Self {
        let path = config
            .path
            .clone()
            .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string());
        Self {
            path: PathBuf::from(path),
            file: None,
            hasher: Sha256::new(),
        }
    }

    /// Sibling path the manifest is written to at close
    pub fn manifest_path(&self) -> PathBuf {
        let mut os: OsString = self.path.clone().into_os_string();
        os.push(".manifest");
        PathBuf::from(os)
    }

    fn open(&mut self) -> Result<(), SinkError> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.file = Some(file);
        }
        Ok(())
    }
}

impl Sink for FileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    fn start(&mut self) -> Result<(), SinkError> {
        self.open()
    }

    fn write(&mut self, event: &LogEvent) -> Result<(), SinkError> {
        self.open()?;

        let mut line = event.to_json()?;
        line.push('\n');

        if let Some(file) = self.file.as_mut() {
            // Durability over throughput: flush every event, then fold the
            // exact bytes written into the running hash
            file.write_all(line.as_bytes())?;
            file.flush()?;
            self.hasher.update(line.as_bytes());
        }

        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let Some(file) = self.file.take() else {
            // Never opened (or already closed): nothing to attest
            return Ok(());
        };
        drop(file);

        let digest = self.hasher.finalize_reset();
        let hex = digest.iter().fold(String::new(), |mut acc, b| {
            acc.push_str(&format!("{:02x}", b));
            acc
        });

        let manifest_path = self.manifest_path();
        info!(
            "Writing manifest to {} with hash {}",
            manifest_path.display(),
            hex
        );
        std::fs::write(&manifest_path, format!("SHA256: {}\n", hex))?;
        Ok(())
    }
}

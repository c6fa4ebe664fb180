//! Error log sinks.
//!
//! The sink is a side channel for operational failures: connect attempts
//! that did not succeed, and statement errors absorbed under the
//! log-and-continue policy. It is deliberately infallible; a sink that
//! cannot write must never fail the database operation it is reporting on.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

/// Receives one message per logged failure.
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);
}

/// Appends timestamped entries to a single file.
///
/// Each entry is two lines:
///
/// ```text
/// [2024-03-15 13:05:09]
/// Connection failed: io error: Connection refused (os error 111)
/// ```
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileSink {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("vivace-mysql-error.log"))
    }
}

impl LogSink for FileSink {
    fn log(&self, message: &str) {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let entry = format!("[{stamp}]\n{message}\n");
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(entry.as_bytes()));
        if written.is_err() {
            log::warn!("could not append to error log {}", self.path.display());
        }
    }
}

/// Discards everything. For callers running a strict error policy who do
/// not want a log file at all.
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _message: &str) {}
}

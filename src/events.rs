//! Structured event records emitted by the organizer.
//!
//! The engine never logs through a global logger. It writes [`LogRecord`]s to
//! an [`EventSink`] it owns, and callers pick where those records go: the
//! `tracing` subscriber ([`TracingSink`]), an in-memory buffer a UI can drain
//! ([`MemorySink`]), an append-only text file ([`LogFileSink`]), nowhere
//! ([`NullSink`]), or several of these at once by pairing sinks in a tuple.

use chrono::{DateTime, Local};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// How important a record is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the organizer's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub message: String,
}

impl LogRecord {
    /// Creates a record stamped with the current local time.
    pub fn now(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            severity,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} - {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.severity,
            self.message
        )
    }
}

/// Destination for the engine's log records.
pub trait EventSink {
    /// Accepts one record. Sinks must not fail the caller.
    fn record(&mut self, record: LogRecord);

    /// Files this sink writes inside the tree being organized.
    ///
    /// The organizer skips these so it never moves its own log.
    fn artifacts(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn record(&mut self, record: LogRecord) {
        (**self).record(record);
    }

    fn artifacts(&self) -> Vec<PathBuf> {
        (**self).artifacts()
    }
}

impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn record(&mut self, record: LogRecord) {
        self.0.record(record.clone());
        self.1.record(record);
    }

    fn artifacts(&self) -> Vec<PathBuf> {
        let mut artifacts = self.0.artifacts();
        artifacts.extend(self.1.artifacts());
        artifacts
    }
}

/// Forwards records to the active `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&mut self, record: LogRecord) {
        match record.severity {
            Severity::Debug => tracing::debug!("{}", record.message),
            Severity::Info => tracing::info!("{}", record.message),
            Severity::Warning => tracing::warn!("{}", record.message),
            Severity::Error => tracing::error!("{}", record.message),
        }
    }
}

/// Drops every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&mut self, _record: LogRecord) {}
}

/// Keeps records in memory until drained.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Vec<LogRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Records at `severity` or above.
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &LogRecord> {
        self.records.iter().filter(move |r| r.severity >= severity)
    }

    /// Removes and returns everything buffered so far.
    pub fn drain(&mut self) -> Vec<LogRecord> {
        std::mem::take(&mut self.records)
    }
}

impl EventSink for MemorySink {
    fn record(&mut self, record: LogRecord) {
        self.records.push(record);
    }
}

/// Appends one formatted line per record to a text file.
///
/// Debug records are not written.
#[derive(Debug)]
pub struct LogFileSink {
    path: PathBuf,
    file: File,
}

impl LogFileSink {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        // The file exists now, so the path can be made absolute for matching.
        let path = path.as_ref().canonicalize()?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for LogFileSink {
    fn record(&mut self, record: LogRecord) {
        if record.severity == Severity::Debug {
            return;
        }
        if let Err(e) = writeln!(self.file, "{record}") {
            tracing::warn!("could not write to log file {}: {}", self.path.display(), e);
        }
    }

    fn artifacts(&self) -> Vec<PathBuf> {
        vec![self.path.clone()]
    }
}

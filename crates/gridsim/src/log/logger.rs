//! Logging.

use std::{
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    path::Path,
};

use super::log_entry::LogEntry;

/// Implements logging of events to console and optionally to a file.
/// Also provides the access to the list of all logged events (trace), if it is kept.
pub struct Logger {
    log_file: Option<BufWriter<File>>,
    keep_trace: bool,
    trace: Vec<LogEntry>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Creates a new console-only logger keeping the trace in memory.
    pub fn new() -> Self {
        Self {
            log_file: None,
            keep_trace: true,
            trace: vec![],
        }
    }

    /// Creates a new logger writing events both to console and the specified file.
    pub fn with_log_file(log_path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(log_path)?;
        Ok(Self {
            log_file: Some(BufWriter::new(file)),
            keep_trace: true,
            trace: vec![],
        })
    }

    /// Sets whether logged events are kept in memory.
    pub fn keep_trace(mut self, keep: bool) -> Self {
        self.keep_trace = keep;
        self
    }

    /// Returns true if events are mirrored to a file.
    pub fn has_log_file(&self) -> bool {
        self.log_file.is_some()
    }

    /// Returns true if logged events are stored anywhere besides the console.
    pub fn is_recording(&self) -> bool {
        self.keep_trace || self.log_file.is_some()
    }

    /// Prints and records an event.
    pub fn log(&mut self, event: LogEntry) {
        event.print();
        self.record(std::iter::once(event));
    }

    /// Records events which have already been printed.
    ///
    /// A failing log file is closed with a warning, the in-memory trace keeps working.
    pub fn record(&mut self, events: impl IntoIterator<Item = LogEntry>) {
        for event in events {
            if let Some(log_file) = self.log_file.as_mut() {
                let written = serde_json::to_writer(&mut *log_file, &event)
                    .map_err(io::Error::from)
                    .and_then(|_| log_file.write_all(b"\n"));
                if let Err(e) = written {
                    ::log::warn!("event log file closed: {}", e);
                    self.log_file = None;
                }
            }
            if self.keep_trace {
                self.trace.push(event);
            }
        }
    }

    /// Flushes the log file, if any.
    pub fn flush(&mut self) -> io::Result<()> {
        match self.log_file.as_mut() {
            Some(log_file) => log_file.flush(),
            None => Ok(()),
        }
    }

    /// Returns a reference to a vector with all logged events.
    pub fn trace(&self) -> &Vec<LogEntry> {
        &self.trace
    }

    /// Takes the logged events out of the logger.
    pub fn take_trace(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.trace)
    }
}

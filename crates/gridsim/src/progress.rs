//! Progress and log-line reporting towards the user interface.

use std::sync::atomic::{AtomicU32, Ordering};

use colored::Colorize;
use parking_lot::Mutex;

/// Severity-like tag of a progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Plain information.
    Info,
    /// Something the user should look at, the run continues.
    Warn,
    /// A stage finished.
    Success,
}

/// Receiver of the progress of a simulation.
///
/// Methods are called from the coordinator and from worker threads.
pub trait SimulationProgress: Send + Sync {
    /// Advances the progress by `percent` points.
    fn inc_progress(&self, percent: u32);

    /// Appends text to the current line.
    fn print(&self, text: &str, tone: Tone);

    /// Appends text and terminates the current line.
    fn println(&self, text: &str, tone: Tone);
}

/// Writes progress through the `log` crate with colors.
#[derive(Default)]
pub struct ConsoleProgress {
    percent: AtomicU32,
    line: Mutex<String>,
}

impl ConsoleProgress {
    /// Creates a console reporter at zero percent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the progress so far.
    pub fn percent(&self) -> u32 {
        self.percent.load(Ordering::Relaxed)
    }
}

fn paint(text: &str, tone: Tone) -> String {
    match tone {
        Tone::Info => text.to_owned(),
        Tone::Warn => text.yellow().to_string(),
        Tone::Success => text.green().to_string(),
    }
}

impl SimulationProgress for ConsoleProgress {
    fn inc_progress(&self, percent: u32) {
        let total = self.percent.fetch_add(percent, Ordering::Relaxed) + percent;
        log::debug!("progress: {}%", total.min(100));
    }

    fn print(&self, text: &str, tone: Tone) {
        self.line.lock().push_str(&paint(text, tone));
    }

    fn println(&self, text: &str, tone: Tone) {
        let line = {
            let mut line = self.line.lock();
            line.push_str(&paint(text, tone));
            std::mem::take(&mut *line)
        };
        match tone {
            Tone::Warn => log::warn!("{}", line),
            _ => log::info!("{}", line),
        }
    }
}

/// Keeps progress in memory, for embedding the simulator and for tests.
#[derive(Default)]
pub struct RecordingProgress {
    percent: AtomicU32,
    lines: Mutex<Vec<(String, Tone)>>,
    current: Mutex<String>,
}

impl RecordingProgress {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the progress so far.
    pub fn percent(&self) -> u32 {
        self.percent.load(Ordering::Relaxed)
    }

    /// Returns completed lines with the tone of their last fragment.
    pub fn lines(&self) -> Vec<(String, Tone)> {
        self.lines.lock().clone()
    }

    /// Returns true if a completed line with the given tone contains `text`.
    pub fn contains(&self, text: &str, tone: Tone) -> bool {
        self.lines.lock().iter().any(|(line, t)| *t == tone && line.contains(text))
    }
}

impl SimulationProgress for RecordingProgress {
    fn inc_progress(&self, percent: u32) {
        self.percent.fetch_add(percent, Ordering::Relaxed);
    }

    fn print(&self, text: &str, _tone: Tone) {
        self.current.lock().push_str(text);
    }

    fn println(&self, text: &str, tone: Tone) {
        let mut current = self.current.lock();
        current.push_str(text);
        self.lines.lock().push((std::mem::take(&mut *current), tone));
    }
}

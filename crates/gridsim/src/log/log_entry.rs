//! Definition of events for logging.

use colored::Colorize;
use serde::Serialize;

use crate::event::EventKind;
use crate::task::{MessageKind, TaskKey};

/// Represents a logged event.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum LogEntry {
    TaskSubmitted {
        time: f64,
        master: String,
        task: TaskKey,
        user: String,
    },
    TaskScheduled {
        time: f64,
        master: String,
        task: TaskKey,
        slave: String,
    },
    TaskArrived {
        time: f64,
        center: String,
        task: TaskKey,
    },
    ServiceStarted {
        time: f64,
        center: String,
        task: TaskKey,
    },
    ServiceFinished {
        time: f64,
        center: String,
        task: TaskKey,
        duration: f64,
    },
    TaskCompleted {
        time: f64,
        master: String,
        task: TaskKey,
        slave: String,
    },
    /// A replica returned after another copy of the same task completed.
    CopyDiscarded {
        time: f64,
        master: String,
        task: TaskKey,
    },
    TaskCancelled {
        time: f64,
        center: String,
        task: TaskKey,
    },
    /// Dynamic update of a master.
    SchedulerTick {
        time: f64,
        master: String,
    },
    MessageSent {
        time: f64,
        msg_id: u64,
        kind: MessageKind,
        src: String,
        dst: String,
    },
    MessageReceived {
        time: f64,
        msg_id: u64,
        kind: MessageKind,
        center: String,
    },
    /// A pending event was removed from a queue.
    EventCancelled {
        time: f64,
        center: String,
        kind: EventKind,
        client: String,
    },
}

impl LogEntry {
    /// Returns the simulated time of the entry.
    pub fn time(&self) -> f64 {
        match self {
            LogEntry::TaskSubmitted { time, .. }
            | LogEntry::TaskScheduled { time, .. }
            | LogEntry::TaskArrived { time, .. }
            | LogEntry::ServiceStarted { time, .. }
            | LogEntry::ServiceFinished { time, .. }
            | LogEntry::TaskCompleted { time, .. }
            | LogEntry::CopyDiscarded { time, .. }
            | LogEntry::TaskCancelled { time, .. }
            | LogEntry::SchedulerTick { time, .. }
            | LogEntry::MessageSent { time, .. }
            | LogEntry::MessageReceived { time, .. }
            | LogEntry::EventCancelled { time, .. } => *time,
        }
    }

    /// Prints log entry to console.
    pub fn print(&self) {
        if !::log::log_enabled!(::log::Level::Trace) {
            return;
        }
        match self {
            LogEntry::TaskSubmitted {
                time,
                master,
                task,
                user,
            } => {
                t!(format!("{:>9.3} {:>10} <<< task {:<8} from {}", time, master, task, user).cyan());
            }
            LogEntry::TaskScheduled {
                time,
                master,
                task,
                slave,
            } => {
                t!(format!("{:>9.3} {:>10} --> {:<10} task {}", time, master, slave, task));
            }
            LogEntry::TaskArrived { .. } => {}
            LogEntry::ServiceStarted { .. } => {}
            LogEntry::ServiceFinished {
                time,
                center,
                task,
                duration,
            } => {
                t!(format!("{:>9.3} {:>10} === task {:<8} in {:.3}", time, center, task, duration));
            }
            LogEntry::TaskCompleted {
                time,
                master,
                task,
                slave,
            } => {
                t!(format!("{:>9.3} {:>10} <-- {:<10} task {} completed", time, master, slave, task).green());
            }
            LogEntry::CopyDiscarded { time, master, task } => {
                t!(format!("{:>9.3} {:>10} --x task {} <-- late copy discarded", time, master, task).yellow());
            }
            LogEntry::TaskCancelled { time, center, task } => {
                t!(format!("{:>9.3} {:>10} --x task {} <-- cancelled", time, center, task).red());
            }
            LogEntry::SchedulerTick { time, master } => {
                t!(format!("{:>9.3} {:>10} !-- update", time, master).yellow());
            }
            LogEntry::MessageSent {
                time,
                msg_id: _,
                kind,
                src,
                dst,
            } => {
                t!(format!("{:>9.3} {:>10} --> {:<10} {:?}", time, src, dst, kind).blue());
            }
            LogEntry::MessageReceived {
                time,
                msg_id: _,
                kind,
                center,
            } => {
                t!(format!("{:>9.3} {:>10} <-- {:?}", time, center, kind).blue());
            }
            LogEntry::EventCancelled {
                time,
                center,
                kind,
                client,
            } => {
                t!(format!("{:>9.3} {:>10} xxx {:?} of {}", time, center, kind, client).red());
            }
        }
    }
}

//! Outcome of a simulation run.

use serde::Serialize;

use crate::task::{Task, TaskState};
use crate::topology::CenterKind;

/// Metrics of one service center at the end of the run.
#[derive(Debug, Clone, Serialize)]
pub struct CenterReport {
    /// Center name.
    pub name: String,
    /// Center variant.
    pub kind: CenterKind,
    /// Transmitted Mbit or processed Mflop.
    pub units: f64,
    /// Time spent serving clients.
    pub busy_seconds: f64,
    /// Completed services.
    pub services: u64,
    /// Retracted services.
    pub cancelled: u64,
    /// Local clock of the center.
    pub clock: f64,
}

impl CenterReport {
    /// Returns the fraction of `horizon` the center spent serving clients.
    pub fn utilization(&self, horizon: f64) -> f64 {
        if horizon > 0. {
            self.busy_seconds / horizon
        } else {
            0.
        }
    }
}

/// Result of [`Simulation::run`](crate::simulation::Simulation::run).
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    /// Largest local clock over all centers.
    pub final_time: f64,
    /// Per-center metrics in topology order.
    pub centers: Vec<CenterReport>,
    /// Completed tasks, discarded replicas and cancelled replicas, ordered by key.
    pub tasks: Vec<Task>,
    /// Number of completed tasks, replicas excluded.
    pub completed: usize,
}

impl SimulationResult {
    /// Looks the report of a center up by name.
    pub fn center(&self, name: &str) -> Option<&CenterReport> {
        self.centers.iter().find(|c| c.name == name)
    }

    /// Returns the tasks whose result reached their master first.
    pub fn completed_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.state() == TaskState::Completed)
    }

    /// Returns the mean time from submission to completion.
    pub fn mean_turnaround(&self) -> Option<f64> {
        let (sum, count) = self
            .completed_tasks()
            .filter_map(|t| t.completed_at().map(|done| done - t.created_at()))
            .fold((0., 0usize), |(sum, count), time| (sum + time, count + 1));
        (count > 0).then(|| sum / count as f64)
    }
}

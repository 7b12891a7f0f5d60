use crate::task::Task;

use super::{SchedulingPolicy, SlaveStatus};

/// Gives each task to the next slave with a free core.
///
/// With replication enabled the master additionally sends copies of unfinished tasks to idle slaves.
#[derive(Default)]
pub struct Workqueue {
    cursor: usize,
    replicas: u32,
}

impl Workqueue {
    /// Creates the policy without replication.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the policy allowing `replicas` extra copies of every task.
    pub fn with_replicas(replicas: u32) -> Self {
        Self { cursor: 0, replicas }
    }
}

impl SchedulingPolicy for Workqueue {
    fn name(&self) -> &str {
        if self.replicas > 0 {
            "workqueue with replication"
        } else {
            "workqueue"
        }
    }

    fn select(&mut self, _task: &Task, slaves: &[SlaveStatus]) -> Option<usize> {
        let count = slaves.len();
        let idx = (0..count)
            .map(|offset| (self.cursor + offset) % count)
            .find(|idx| slaves[*idx].free_cores() > 0)?;
        self.cursor = idx + 1;
        Some(idx)
    }

    fn replicas(&self) -> u32 {
        self.replicas
    }
}

use crate::task::Task;

use super::{SchedulingPolicy, SlaveStatus};

/// Hands tasks to slaves in cyclic order, regardless of their load.
#[derive(Default)]
pub struct RoundRobin {
    next: usize,
}

impl RoundRobin {
    /// Creates the policy starting from the first slave.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchedulingPolicy for RoundRobin {
    fn name(&self) -> &str {
        "round robin"
    }

    fn select(&mut self, _task: &Task, slaves: &[SlaveStatus]) -> Option<usize> {
        if slaves.is_empty() {
            return None;
        }
        let idx = self.next % slaves.len();
        self.next = idx + 1;
        Some(idx)
    }
}

use ordered_float::OrderedFloat;

use crate::task::Task;

use super::{SchedulingPolicy, SlaveStatus};

/// Picks the slave which would finish the task first according to the estimated queued work.
///
/// The estimate grows with every dispatched task and is replaced by the load a slave reports in dynamic mode.
#[derive(Default)]
pub struct LoadBased;

impl LoadBased {
    /// Creates the policy.
    pub fn new() -> Self {
        Self
    }
}

impl SchedulingPolicy for LoadBased {
    fn name(&self) -> &str {
        "load based"
    }

    fn select(&mut self, task: &Task, slaves: &[SlaveStatus]) -> Option<usize> {
        slaves
            .iter()
            .enumerate()
            .min_by_key(|(idx, slave)| {
                let finish = (slave.estimated_work + task.processing_size()) / slave.power;
                (OrderedFloat(finish), *idx)
            })
            .map(|(idx, _)| idx)
    }
}

//! Assignment of tasks to slave machines.

mod load_based;
mod round_robin;
mod workqueue;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sugars::boxed;

use crate::task::{SlaveLoad, Task, TaskKey};
use crate::topology::CenterId;

pub use load_based::LoadBased;
pub use round_robin::RoundRobin;
pub use workqueue::Workqueue;

/// What a master knows about one of its slaves.
#[derive(Debug, Clone)]
pub struct SlaveStatus {
    /// Slave id.
    pub id: CenterId,
    /// Slave name.
    pub name: String,
    /// Power of one core in Mflop/s.
    pub power: f64,
    /// Number of cores.
    pub cores: u32,
    /// Task copies sent to the slave and not yet returned.
    pub outstanding: BTreeSet<TaskKey>,
    /// Estimate of the work queued on the slave in Mflop.
    pub estimated_work: f64,
    /// Last load reported by the slave.
    pub reported: Option<SlaveLoad>,
}

impl SlaveStatus {
    /// Creates the status of an idle slave.
    pub fn new(id: CenterId, name: &str, power: f64, cores: u32) -> Self {
        Self {
            id,
            name: name.to_owned(),
            power,
            cores,
            outstanding: BTreeSet::new(),
            estimated_work: 0.,
            reported: None,
        }
    }

    /// Returns the number of cores not occupied by outstanding tasks.
    pub fn free_cores(&self) -> usize {
        (self.cores as usize).saturating_sub(self.outstanding.len())
    }

    /// Returns true if the slave holds a copy of the given task family.
    pub fn holds_family(&self, family: u64) -> bool {
        self.outstanding.iter().any(|key| key.id == family)
    }
}

/// Policy used by a master to pick the slave for the next task.
pub trait SchedulingPolicy: Send {
    /// Returns the policy name.
    fn name(&self) -> &str;

    /// Returns the index in `slaves` of the slave which gets `task`, or `None` to keep the task waiting.
    fn select(&mut self, task: &Task, slaves: &[SlaveStatus]) -> Option<usize>;

    /// Returns how many extra copies of each task may run at the same time.
    fn replicas(&self) -> u32 {
        0
    }
}

/// Serializable choice of a built-in policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum PolicyKind {
    /// Slaves in cyclic order.
    #[default]
    RoundRobin,
    /// Next slave with a free core, tasks wait while all slaves are busy.
    Workqueue,
    /// Slave with the least estimated completion time.
    LoadBased,
    /// Workqueue with replication of unfinished tasks onto idle slaves.
    Wqr {
        /// Extra copies allowed per task.
        replicas: u32,
    },
}

impl PolicyKind {
    /// Creates the policy.
    pub fn build(&self) -> Box<dyn SchedulingPolicy> {
        match self {
            PolicyKind::RoundRobin => boxed!(RoundRobin::new()),
            PolicyKind::Workqueue => boxed!(Workqueue::new()),
            PolicyKind::LoadBased => boxed!(LoadBased::new()),
            PolicyKind::Wqr { replicas } => boxed!(Workqueue::with_replicas(*replicas)),
        }
    }
}

#[cfg(test)]
mod tests;

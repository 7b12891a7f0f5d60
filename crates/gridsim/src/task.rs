//! Clients flowing through the queueing network: tasks and control messages.

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;

use crate::topology::CenterId;

/// Identifies one copy of a task.
///
/// Copy `0` is the original task submitted by the user, other copies are replicas created by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskKey {
    /// Id of the original task.
    pub id: u64,
    /// Copy number.
    pub copy: u32,
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.copy == 0 {
            f.pad(&self.id.to_string())
        } else {
            f.pad(&format!("{}#{}", self.id, self.copy))
        }
    }
}

/// Lifecycle stage of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting at its master.
    Submitted,
    /// Travelling to the slave which will process it.
    Transferring,
    /// Queued or being processed on its slave.
    Processing,
    /// Processed, result travelling back to the master.
    Processed,
    /// Result received by the master.
    Completed,
    /// Retracted before its slave finished it.
    Cancelled,
}

/// A unit of work sent by a master to one of its slaves and back.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    key: TaskKey,
    user: String,
    origin: CenterId,
    created_at: f64,
    processing_size: f64,
    send_size: f64,
    result_size: f64,
    state: TaskState,
    path: VecDeque<CenterId>,
    slave: Option<CenterId>,
    hops_planned: usize,
    hops_traversed: usize,
    communication_started: Option<f64>,
    communication_time: f64,
    processing_started: Option<f64>,
    processing_finished: Option<f64>,
    processing_time: f64,
    completed_at: Option<f64>,
}

impl Task {
    /// Creates an original task.
    ///
    /// Sizes are in Mflop for `processing_size` and in Mbit for `send_size` (input shipped to the slave) and
    /// `result_size` (output shipped back).
    pub fn new(
        id: u64,
        user: &str,
        origin: CenterId,
        created_at: f64,
        processing_size: f64,
        send_size: f64,
        result_size: f64,
    ) -> Self {
        Self {
            key: TaskKey { id, copy: 0 },
            user: user.to_owned(),
            origin,
            created_at,
            processing_size,
            send_size,
            result_size,
            state: TaskState::Submitted,
            path: VecDeque::new(),
            slave: None,
            hops_planned: 0,
            hops_traversed: 0,
            communication_started: None,
            communication_time: 0.,
            processing_started: None,
            processing_finished: None,
            processing_time: 0.,
            completed_at: None,
        }
    }

    /// Creates a fresh replica of this task with the given copy number.
    pub fn replicate(&self, copy: u32) -> Self {
        let mut replica = Self::new(
            self.key.id,
            &self.user,
            self.origin,
            self.created_at,
            self.processing_size,
            self.send_size,
            self.result_size,
        );
        replica.key.copy = copy;
        replica
    }

    /// Returns the key of this copy.
    pub fn key(&self) -> TaskKey {
        self.key
    }

    /// Returns the id shared by the original task and all its replicas.
    pub fn family(&self) -> u64 {
        self.key.id
    }

    /// Returns true if this is a replica.
    pub fn is_copy(&self) -> bool {
        self.key.copy != 0
    }

    /// Returns the owning user.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Returns the master which submitted the task.
    pub fn origin(&self) -> CenterId {
        self.origin
    }

    /// Returns the creation time.
    pub fn created_at(&self) -> f64 {
        self.created_at
    }

    /// Returns the processing size in Mflop.
    pub fn processing_size(&self) -> f64 {
        self.processing_size
    }

    /// Returns the size currently transmitted with the task: the input before processing, the result afterwards.
    pub fn communication_size(&self) -> f64 {
        match self.state {
            TaskState::Processed | TaskState::Completed => self.result_size,
            _ => self.send_size,
        }
    }

    /// Returns the lifecycle stage.
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Returns the slave chosen by the scheduler.
    pub fn slave(&self) -> Option<CenterId> {
        self.slave
    }

    /// Returns the hops left to traverse.
    pub fn path(&self) -> &VecDeque<CenterId> {
        &self.path
    }

    /// Returns the total length of all paths installed on the task.
    pub fn hops_planned(&self) -> usize {
        self.hops_planned
    }

    /// Returns the number of hops already taken.
    pub fn hops_traversed(&self) -> usize {
        self.hops_traversed
    }

    /// Returns the time spent in communication centers.
    pub fn communication_time(&self) -> f64 {
        self.communication_time
    }

    /// Returns the time spent being processed.
    pub fn processing_time(&self) -> f64 {
        self.processing_time
    }

    /// Returns the time its result reached the master.
    pub fn completed_at(&self) -> Option<f64> {
        self.completed_at
    }

    /// Returns the time the slave finished processing it.
    pub fn processing_finished(&self) -> Option<f64> {
        self.processing_finished
    }

    /// Installs a path and moves the task to the given stage.
    pub(crate) fn set_route(&mut self, path: &[CenterId], state: TaskState) {
        self.path = path.iter().copied().collect();
        self.hops_planned += path.len();
        self.state = state;
    }

    pub(crate) fn assign(&mut self, slave: CenterId) {
        self.slave = Some(slave);
    }

    /// Pops the next hop off the path.
    pub(crate) fn next_hop(&mut self) -> Option<CenterId> {
        let hop = self.path.pop_front()?;
        self.hops_traversed += 1;
        Some(hop)
    }

    pub(crate) fn begin_communication(&mut self, time: f64) {
        self.communication_started = Some(time);
    }

    pub(crate) fn end_communication(&mut self, time: f64) {
        if let Some(start) = self.communication_started.take() {
            self.communication_time += time - start;
        }
    }

    pub(crate) fn begin_processing(&mut self, time: f64) {
        self.state = TaskState::Processing;
        self.processing_started = Some(time);
    }

    pub(crate) fn end_processing(&mut self, time: f64) {
        if let Some(start) = self.processing_started {
            self.processing_time += time - start;
        }
        self.processing_finished = Some(time);
        self.state = TaskState::Processed;
    }

    pub(crate) fn complete(&mut self, time: f64) {
        self.state = TaskState::Completed;
        self.completed_at = Some(time);
    }

    pub(crate) fn cancel(&mut self, time: f64) {
        if let Some(start) = self.processing_started.take() {
            self.processing_time += time - start;
        }
        self.path.clear();
        self.state = TaskState::Cancelled;
    }
}

/// Size in Mbit of every control message.
pub const CONTROL_MESSAGE_SIZE: f64 = 0.011444091796875;

/// Purpose of a control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Master asks a slave for its current load.
    Update,
    /// Slave answers an update.
    UpdateResult,
    /// Master retracts a task copy from a slave.
    Cancel,
}

/// Load of a slave as reported in an update result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SlaveLoad {
    /// Time of the snapshot.
    pub time: f64,
    /// Tasks waiting for a core.
    pub waiting: usize,
    /// Tasks being processed.
    pub running: usize,
    /// Work left in Mflop over waiting and running tasks.
    pub remaining_work: f64,
}

/// Control-plane client exchanged between a master and a slave.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    id: u64,
    kind: MessageKind,
    master: CenterId,
    slave: CenterId,
    size: f64,
    path: VecDeque<CenterId>,
    task: Option<TaskKey>,
    load: Option<SlaveLoad>,
}

impl Message {
    /// Creates a message with an empty path.
    pub fn new(id: u64, kind: MessageKind, master: CenterId, slave: CenterId) -> Self {
        Self {
            id,
            kind,
            master,
            slave,
            size: CONTROL_MESSAGE_SIZE,
            path: VecDeque::new(),
            task: None,
            load: None,
        }
    }

    /// Attaches the task this message refers to.
    pub fn with_task(mut self, task: TaskKey) -> Self {
        self.task = Some(task);
        self
    }

    /// Attaches a load report.
    pub fn with_load(mut self, load: SlaveLoad) -> Self {
        self.load = Some(load);
        self
    }

    /// Installs the path to traverse.
    pub fn with_route(mut self, path: &[CenterId]) -> Self {
        self.path = path.iter().copied().collect();
        self
    }

    /// Returns the message id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the purpose of the message.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Returns the master end of the exchange.
    pub fn master(&self) -> CenterId {
        self.master
    }

    /// Returns the slave end of the exchange.
    pub fn slave(&self) -> CenterId {
        self.slave
    }

    /// Returns the size in Mbit.
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Returns the task this message refers to.
    pub fn task(&self) -> Option<TaskKey> {
        self.task
    }

    /// Returns the attached load report.
    pub fn load(&self) -> Option<&SlaveLoad> {
        self.load.as_ref()
    }

    /// Returns the hops left to traverse.
    pub fn path(&self) -> &VecDeque<CenterId> {
        &self.path
    }

    pub(crate) fn next_hop(&mut self) -> Option<CenterId> {
        self.path.pop_front()
    }
}

//! Future events of the simulation.

use std::cmp::Ordering;
use std::fmt;

use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::task::{Message, Task, TaskKey};
use crate::topology::CenterId;

/// Kind of a future event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Client enters a center.
    Arrival,
    /// Center starts serving a client.
    Service,
    /// Center finishes serving a client.
    Departure,
    /// Master runs its scheduling pass.
    Schedule,
    /// Control message reaches a center.
    Message,
}

/// Identifies the client an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClientId {
    /// A task copy.
    Task(TaskKey),
    /// A control message.
    Message(u64),
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientId::Task(key) => write!(f, "task {}", key),
            ClientId::Message(id) => write!(f, "message {}", id),
        }
    }
}

/// Event data. The variant determines the [`EventKind`].
#[derive(Debug)]
pub enum EventPayload {
    /// Task enters the target center.
    Arrival(Box<Task>),
    /// Target center starts serving the task.
    Service(Box<Task>),
    /// Target center finishes serving the task.
    Departure(Box<Task>),
    /// Scheduling pass of the target master.
    Schedule,
    /// Message reaches the target center.
    Message(Box<Message>),
}

impl EventPayload {
    /// Returns the kind of the event.
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Arrival(_) => EventKind::Arrival,
            EventPayload::Service(_) => EventKind::Service,
            EventPayload::Departure(_) => EventKind::Departure,
            EventPayload::Schedule => EventKind::Schedule,
            EventPayload::Message(_) => EventKind::Message,
        }
    }

    /// Returns the client carried by the event.
    pub fn client(&self) -> Option<ClientId> {
        match self {
            EventPayload::Arrival(task) | EventPayload::Service(task) | EventPayload::Departure(task) => {
                Some(ClientId::Task(task.key()))
            }
            EventPayload::Schedule => None,
            EventPayload::Message(msg) => Some(ClientId::Message(msg.id())),
        }
    }
}

/// A state transition scheduled at a simulated time on one center.
///
/// Events are ordered by time and then by their insertion sequence number, which the target queue assigns on push.
/// The order is reversed so that [`std::collections::BinaryHeap`] pops the earliest event first.
#[derive(Debug)]
pub struct FutureEvent {
    time: f64,
    seq: u64,
    target: CenterId,
    payload: EventPayload,
}

impl FutureEvent {
    /// Creates an event.
    pub fn new(time: f64, target: CenterId, payload: EventPayload) -> Self {
        Self {
            time,
            seq: 0,
            target,
            payload,
        }
    }

    /// Returns the occurrence time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Returns the center the event is enqueued on.
    pub fn target(&self) -> CenterId {
        self.target
    }

    /// Returns the kind of the event.
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Returns the client carried by the event.
    pub fn client(&self) -> Option<ClientId> {
        self.payload.client()
    }

    /// Returns the event data.
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Consumes the event and returns its data.
    pub fn into_payload(self) -> EventPayload {
        self.payload
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    /// Returns true if the event matches a cancellation request.
    pub fn matches(&self, kind: EventKind, client: Option<ClientId>) -> bool {
        self.kind() == kind && self.client() == client
    }
}

impl PartialEq for FutureEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FutureEvent {}

impl PartialOrd for FutureEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FutureEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        (OrderedFloat(other.time), other.seq).cmp(&(OrderedFloat(self.time), self.seq))
    }
}

//! Access of a service center to the rest of the simulation.

use crate::error::{ConsistencyError, HandlerResult};
use crate::event::{ClientId, EventKind, EventPayload, FutureEvent};
use crate::log::LogEntry;
use crate::simulation::Engine;
use crate::task::{Message, MessageKind};
use crate::topology::{CenterId, Topology};

/// Proxy passed to the handlers of a [`ServiceCenter`](crate::center::ServiceCenter).
///
/// Carries the local time of the center at the moment the handled event occurs. Trace entries are collected in a
/// buffer owned by the worker and handed to the logger in batches.
pub struct Context<'a> {
    engine: &'a Engine,
    id: CenterId,
    time: f64,
    trace: &'a mut Vec<LogEntry>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(engine: &'a Engine, id: CenterId, time: f64, trace: &'a mut Vec<LogEntry>) -> Self {
        Self {
            engine,
            id,
            time,
            trace,
        }
    }

    /// Returns the id of the center.
    pub fn id(&self) -> CenterId {
        self.id
    }

    /// Returns the name of the center.
    pub fn name(&self) -> &'a str {
        self.engine.topology().name(self.id)
    }

    /// Returns the local time of the center.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Returns the topology.
    pub fn topology(&self) -> &'a Topology {
        self.engine.topology()
    }

    /// Enqueues an event on `target` after `delay`.
    pub fn emit(&self, payload: EventPayload, target: CenterId, delay: f64) {
        self.engine.push(FutureEvent::new(self.time + delay, target, payload));
    }

    /// Enqueues an event on `target` at the current time.
    pub fn emit_now(&self, payload: EventPayload, target: CenterId) {
        self.emit(payload, target, 0.);
    }

    /// Enqueues an event on this center after `delay`.
    pub fn emit_self(&self, payload: EventPayload, delay: f64) {
        self.emit(payload, self.id, delay);
    }

    /// Enqueues an event on this center at the current time.
    pub fn emit_self_now(&self, payload: EventPayload) {
        self.emit(payload, self.id, 0.);
    }

    /// Removes a pending event of this center. Returns `None` if there is no such event.
    pub fn cancel(&mut self, kind: EventKind, client: Option<ClientId>) -> Option<FutureEvent> {
        let event = self.engine.cancel(self.id, kind, client)?;
        self.log(LogEntry::EventCancelled {
            time: self.time,
            center: self.name().to_owned(),
            kind,
            client: client.map_or_else(String::new, |c| c.to_string()),
        });
        Some(event)
    }

    /// Returns the precomputed path between two centers.
    pub fn route(&self, from: CenterId, to: CenterId) -> Result<&'a [CenterId], ConsistencyError> {
        self.engine.route(from, to)
    }

    /// Sends a control message along its path.
    pub fn send(&mut self, mut message: Message) -> HandlerResult {
        let dst = match message.kind() {
            MessageKind::UpdateResult => message.master(),
            MessageKind::Update | MessageKind::Cancel => message.slave(),
        };
        self.log(LogEntry::MessageSent {
            time: self.time,
            msg_id: message.id(),
            kind: message.kind(),
            src: self.name().to_owned(),
            dst: self.topology().name(dst).to_owned(),
        });
        let next = message.next_hop().ok_or_else(|| ConsistencyError::DanglingPath {
            center: self.name().to_owned(),
            client: format!("message {}", message.id()),
        })?;
        self.emit_now(EventPayload::Message(Box::new(message)), next);
        Ok(())
    }

    /// Returns a fresh message id.
    pub fn next_message_id(&self) -> u64 {
        self.engine.next_message_id()
    }

    /// Appends an entry to the event trace.
    pub fn log(&mut self, entry: LogEntry) {
        entry.print();
        if self.engine.is_recording() {
            self.trace.push(entry);
        }
    }

    /// Reports the completion of a task family.
    pub fn task_completed(&self) {
        self.engine.task_completed();
    }
}

use crate::context::Context;
use crate::error::{ConsistencyError, HandlerResult};
use crate::event::EventPayload;
use crate::log::LogEntry;
use crate::task::{Message, Task};
use crate::topology::CenterKind;

use super::{Metrics, ServiceCenter};

/// Link, internet hub or switch.
///
/// Every client is served as soon as it arrives, so transmissions overlap and do not wait for each other.
pub struct Communication {
    kind: CenterKind,
    bandwidth: f64,
    occupancy: f64,
    latency: f64,
    load: usize,
    metrics: Metrics,
}

impl Communication {
    /// Creates a communication center.
    pub fn new(kind: CenterKind, bandwidth: f64, occupancy: f64, latency: f64) -> Self {
        Self {
            kind,
            bandwidth,
            occupancy,
            latency,
            load: 0,
            metrics: Metrics::default(),
        }
    }

    /// Returns the variant of the center.
    pub fn kind(&self) -> CenterKind {
        self.kind
    }

    /// Time needed to transmit `size` Mbit.
    pub fn transmission_time(&self, size: f64) -> f64 {
        size / (self.bandwidth * (1. - self.occupancy)) + self.latency
    }
}

impl ServiceCenter for Communication {
    fn on_arrival(&mut self, mut task: Box<Task>, ctx: &mut Context) -> HandlerResult {
        ctx.log(LogEntry::TaskArrived {
            time: ctx.time(),
            center: ctx.name().to_owned(),
            task: task.key(),
        });
        task.begin_communication(ctx.time());
        ctx.emit_self_now(EventPayload::Service(task));
        Ok(())
    }

    fn on_service_begin(&mut self, task: Box<Task>, ctx: &mut Context) -> HandlerResult {
        self.load += 1;
        ctx.log(LogEntry::ServiceStarted {
            time: ctx.time(),
            center: ctx.name().to_owned(),
            task: task.key(),
        });
        let delay = self.transmission_time(task.communication_size());
        ctx.emit_self(EventPayload::Departure(task), delay);
        Ok(())
    }

    fn on_departure(&mut self, mut task: Box<Task>, ctx: &mut Context) -> HandlerResult {
        self.load = self.load.saturating_sub(1);
        let size = task.communication_size();
        let duration = self.transmission_time(size);
        self.metrics.record_service(size, duration);
        task.end_communication(ctx.time());
        ctx.log(LogEntry::ServiceFinished {
            time: ctx.time(),
            center: ctx.name().to_owned(),
            task: task.key(),
            duration,
        });

        let next = task.next_hop().ok_or_else(|| ConsistencyError::DanglingPath {
            center: ctx.name().to_owned(),
            client: format!("task {}", task.key()),
        })?;
        ctx.emit_now(EventPayload::Arrival(task), next);
        Ok(())
    }

    fn on_message(&mut self, mut message: Box<Message>, ctx: &mut Context) -> HandlerResult {
        let duration = self.transmission_time(message.size());
        self.metrics.record_service(message.size(), duration);

        let next = message.next_hop().ok_or_else(|| ConsistencyError::DanglingPath {
            center: ctx.name().to_owned(),
            client: format!("message {}", message.id()),
        })?;
        ctx.emit(EventPayload::Message(message), next, duration);
        Ok(())
    }

    fn load(&self) -> usize {
        self.load
    }

    fn metrics(&self) -> Metrics {
        self.metrics
    }
}

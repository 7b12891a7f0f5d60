//! Service centers: the nodes of the queueing network.

mod communication;
mod machine;
mod master;
mod metrics;

use downcast_rs::{impl_downcast, Downcast};

use crate::context::Context;
use crate::error::{ConsistencyError, HandlerResult};
use crate::event::EventKind;
use crate::task::{Message, Task};
use crate::topology::{CenterId, CenterParams, Topology};

pub use communication::Communication;
pub use machine::Machine;
pub use master::Master;
pub use metrics::Metrics;

/// Behaviour of a node of the queueing network.
///
/// Handlers are invoked by the worker owning the center, never concurrently. New events are emitted through the
/// [`Context`], which also carries the local time of the center.
pub trait ServiceCenter: Downcast + Send {
    /// A client enters the center.
    fn on_arrival(&mut self, task: Box<Task>, ctx: &mut Context) -> HandlerResult;

    /// The center starts serving a client.
    fn on_service_begin(&mut self, task: Box<Task>, ctx: &mut Context) -> HandlerResult;

    /// The center finishes serving a client.
    fn on_departure(&mut self, task: Box<Task>, ctx: &mut Context) -> HandlerResult;

    /// A control message reaches the center.
    fn on_message(&mut self, message: Box<Message>, ctx: &mut Context) -> HandlerResult;

    /// Scheduling pass. Only masters schedule.
    fn on_schedule(&mut self, ctx: &mut Context) -> HandlerResult {
        Err(ConsistencyError::UnexpectedEvent {
            center: ctx.name().to_owned(),
            kind: EventKind::Schedule,
            reason: "only masters schedule tasks".to_owned(),
        })
    }

    /// Dynamic update fired by the worker.
    fn on_tick(&mut self, _ctx: &mut Context) -> HandlerResult {
        Ok(())
    }

    /// Interval between dynamic updates, `None` if the center has none.
    fn update_interval(&self) -> Option<f64> {
        None
    }

    /// Returns true while dynamic updates are still needed.
    fn has_pending_work(&self) -> bool {
        false
    }

    /// Returns the number of clients currently served.
    fn load(&self) -> usize;

    /// Returns the accumulated metrics.
    fn metrics(&self) -> Metrics;

    /// Takes the tasks which ended their life at this center.
    fn take_tasks(&mut self) -> Vec<Task> {
        Vec::new()
    }
}

impl_downcast!(ServiceCenter);

/// Creates the service center described by the topology entry `id`.
pub fn build_center(topology: &Topology, id: CenterId) -> Box<dyn ServiceCenter> {
    let spec = topology.center(id);
    match &spec.params {
        CenterParams::Machine {
            power,
            cores,
            occupancy,
        } => Box::new(Machine::new(*power, *cores, *occupancy)),
        CenterParams::Communication {
            bandwidth,
            occupancy,
            latency,
        } => Box::new(Communication::new(spec.kind, *bandwidth, *occupancy, *latency)),
        CenterParams::Master {
            power,
            policy,
            update_interval,
            slaves,
        } => Box::new(Master::new(topology, *power, policy.build(), *update_interval, slaves)),
    }
}

#[cfg(test)]
mod tests;

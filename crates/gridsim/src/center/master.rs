use std::collections::{BTreeMap, VecDeque};

use crate::context::Context;
use crate::error::{ConsistencyError, HandlerResult};
use crate::event::{EventKind, EventPayload};
use crate::log::LogEntry;
use crate::scheduler::{SchedulingPolicy, SlaveStatus};
use crate::task::{Message, MessageKind, Task, TaskState};
use crate::topology::{CenterId, CenterParams, Topology};

use super::{Metrics, ServiceCenter};

struct Family {
    template: Task,
    copies: u32,
    done: bool,
}

/// Scheduler which dispatches the tasks submitted by its users to its slave machines.
pub struct Master {
    power: f64,
    policy: Box<dyn SchedulingPolicy>,
    update_interval: Option<f64>,
    slaves: Vec<SlaveStatus>,
    pending: VecDeque<Box<Task>>,
    families: BTreeMap<u64, Family>,
    expected: usize,
    completed: usize,
    retained: Vec<Task>,
    load: usize,
    metrics: Metrics,
}

impl Master {
    /// Creates a master owning the given slave machines of the topology.
    pub fn new(
        topology: &Topology,
        power: f64,
        policy: Box<dyn SchedulingPolicy>,
        update_interval: Option<f64>,
        slaves: &[CenterId],
    ) -> Self {
        let slaves = slaves
            .iter()
            .map(|id| {
                let (power, cores) = match topology.center(*id).params {
                    CenterParams::Machine {
                        power,
                        cores,
                        occupancy,
                    } => (power * (1. - occupancy), cores),
                    _ => (1., 1),
                };
                SlaveStatus::new(*id, topology.name(*id), power, cores)
            })
            .collect();
        Self {
            power,
            policy,
            update_interval,
            slaves,
            pending: VecDeque::new(),
            families: BTreeMap::new(),
            expected: 0,
            completed: 0,
            retained: Vec::new(),
            load: 0,
            metrics: Metrics::default(),
        }
    }

    /// Announces tasks which will be submitted to this master.
    pub fn expect_tasks(&mut self, count: usize) {
        self.expected += count;
    }

    /// Returns the number of tasks whose result has been received.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Returns the computational power.
    pub fn power(&self) -> f64 {
        self.power
    }

    /// Returns the name of the scheduling policy.
    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    /// Returns what the master knows about its slaves.
    pub fn slaves(&self) -> &[SlaveStatus] {
        &self.slaves
    }

    fn slave_index(&self, slave: CenterId, ctx: &Context) -> Result<usize, ConsistencyError> {
        self.slaves
            .iter()
            .position(|s| s.id == slave)
            .ok_or_else(|| ConsistencyError::UnknownSlave {
                master: ctx.name().to_owned(),
                slave: ctx.topology().name(slave).to_owned(),
            })
    }

    fn dispatch(&mut self, mut task: Box<Task>, idx: usize, ctx: &mut Context) -> HandlerResult {
        let slave = &mut self.slaves[idx];
        let route = ctx.route(ctx.id(), slave.id)?;
        task.assign(slave.id);
        task.set_route(route, TaskState::Transferring);
        slave.outstanding.insert(task.key());
        slave.estimated_work += task.processing_size();
        ctx.log(LogEntry::TaskScheduled {
            time: ctx.time(),
            master: ctx.name().to_owned(),
            task: task.key(),
            slave: slave.name.clone(),
        });
        ctx.emit_self_now(EventPayload::Service(task));
        Ok(())
    }

    fn forget_copy(&mut self, idx: usize, task: &Task) -> bool {
        let slave = &mut self.slaves[idx];
        let removed = slave.outstanding.remove(&task.key());
        if removed {
            slave.estimated_work = (slave.estimated_work - task.processing_size()).max(0.);
        }
        removed
    }

    fn replicate(&mut self, ctx: &mut Context) -> HandlerResult {
        let max_copies = self.policy.replicas() + 1;
        for idx in 0..self.slaves.len() {
            while self.slaves[idx].free_cores() > 0 {
                let slave = &self.slaves[idx];
                let candidate = self
                    .families
                    .iter()
                    .filter(|(id, family)| !family.done && family.copies < max_copies && !slave.holds_family(**id))
                    .min_by_key(|(id, family)| (family.copies, **id))
                    .map(|(id, _)| *id);
                let Some(family) = candidate.and_then(|id| self.families.get_mut(&id)) else {
                    break;
                };
                let replica = family.template.replicate(family.copies);
                family.copies += 1;
                self.dispatch(Box::new(replica), idx, ctx)?;
            }
        }
        Ok(())
    }

    fn cancel_copies(&mut self, family: u64, ctx: &mut Context) -> HandlerResult {
        for idx in 0..self.slaves.len() {
            let copies: Vec<_> = self.slaves[idx]
                .outstanding
                .iter()
                .filter(|key| key.id == family)
                .copied()
                .collect();
            for key in copies {
                let slave = &mut self.slaves[idx];
                slave.outstanding.remove(&key);
                if let Some(template) = self.families.get(&family) {
                    slave.estimated_work = (slave.estimated_work - template.template.processing_size()).max(0.);
                }
                let route = ctx.route(ctx.id(), slave.id)?;
                let message = Message::new(ctx.next_message_id(), MessageKind::Cancel, ctx.id(), slave.id)
                    .with_task(key)
                    .with_route(route);
                ctx.send(message)?;
            }
        }
        Ok(())
    }

    fn on_result(&mut self, mut task: Box<Task>, ctx: &mut Context) -> HandlerResult {
        if !task.path().is_empty() {
            return Err(ConsistencyError::UnexpectedHop {
                center: ctx.name().to_owned(),
                task: task.key(),
                remaining: task.path().len(),
            });
        }
        let slave = task.slave().ok_or_else(|| ConsistencyError::UnexpectedEvent {
            center: ctx.name().to_owned(),
            kind: EventKind::Arrival,
            reason: format!("task {} returned without a slave", task.key()),
        })?;
        let idx = self.slave_index(slave, ctx)?;
        self.forget_copy(idx, &task);

        let family = self
            .families
            .get_mut(&task.family())
            .ok_or_else(|| ConsistencyError::UnexpectedEvent {
                center: ctx.name().to_owned(),
                kind: EventKind::Arrival,
                reason: format!("task {} was never submitted here", task.key()),
            })?;

        if family.done {
            ctx.log(LogEntry::CopyDiscarded {
                time: ctx.time(),
                master: ctx.name().to_owned(),
                task: task.key(),
            });
            self.retained.push(*task);
        } else {
            family.done = true;
            task.complete(ctx.time());
            self.completed += 1;
            ctx.log(LogEntry::TaskCompleted {
                time: ctx.time(),
                master: ctx.name().to_owned(),
                task: task.key(),
                slave: ctx.topology().name(slave).to_owned(),
            });
            ctx.task_completed();
            let id = task.family();
            self.retained.push(*task);
            self.cancel_copies(id, ctx)?;
        }

        if !self.pending.is_empty() || self.policy.replicas() > 0 {
            ctx.emit_self_now(EventPayload::Schedule);
        }
        Ok(())
    }
}

impl ServiceCenter for Master {
    fn on_arrival(&mut self, task: Box<Task>, ctx: &mut Context) -> HandlerResult {
        if task.state() != TaskState::Submitted {
            return self.on_result(task, ctx);
        }
        ctx.log(LogEntry::TaskSubmitted {
            time: ctx.time(),
            master: ctx.name().to_owned(),
            task: task.key(),
            user: task.user().to_owned(),
        });
        self.families.entry(task.family()).or_insert_with(|| Family {
            template: (*task).clone(),
            copies: 1,
            done: false,
        });
        self.pending.push_back(task);
        ctx.emit_self_now(EventPayload::Schedule);
        Ok(())
    }

    fn on_service_begin(&mut self, task: Box<Task>, ctx: &mut Context) -> HandlerResult {
        self.load += 1;
        ctx.emit_self_now(EventPayload::Departure(task));
        Ok(())
    }

    fn on_departure(&mut self, mut task: Box<Task>, ctx: &mut Context) -> HandlerResult {
        self.load = self.load.saturating_sub(1);
        self.metrics.record_service(task.communication_size(), 0.);
        let next = task.next_hop().ok_or_else(|| ConsistencyError::DanglingPath {
            center: ctx.name().to_owned(),
            client: format!("task {}", task.key()),
        })?;
        ctx.emit_now(EventPayload::Arrival(task), next);
        Ok(())
    }

    fn on_message(&mut self, message: Box<Message>, ctx: &mut Context) -> HandlerResult {
        ctx.log(LogEntry::MessageReceived {
            time: ctx.time(),
            msg_id: message.id(),
            kind: message.kind(),
            center: ctx.name().to_owned(),
        });
        match (message.kind(), message.load()) {
            (MessageKind::UpdateResult, Some(load)) => {
                let idx = self.slave_index(message.slave(), ctx)?;
                let slave = &mut self.slaves[idx];
                slave.estimated_work = load.remaining_work;
                slave.reported = Some(*load);
                Ok(())
            }
            (kind, _) => Err(ConsistencyError::UnexpectedEvent {
                center: ctx.name().to_owned(),
                kind: EventKind::Message,
                reason: format!("unexpected {:?} message", kind),
            }),
        }
    }

    fn on_schedule(&mut self, ctx: &mut Context) -> HandlerResult {
        while let Some(task) = self.pending.front() {
            let Some(idx) = self.policy.select(task, &self.slaves) else {
                break;
            };
            let Some(task) = self.pending.pop_front() else {
                break;
            };
            self.dispatch(task, idx, ctx)?;
        }
        if self.pending.is_empty() && self.policy.replicas() > 0 {
            self.replicate(ctx)?;
        }
        Ok(())
    }

    fn on_tick(&mut self, ctx: &mut Context) -> HandlerResult {
        ctx.log(LogEntry::SchedulerTick {
            time: ctx.time(),
            master: ctx.name().to_owned(),
        });
        for slave in &self.slaves {
            let route = ctx.route(ctx.id(), slave.id)?;
            let message = Message::new(ctx.next_message_id(), MessageKind::Update, ctx.id(), slave.id).with_route(route);
            ctx.send(message)?;
        }
        Ok(())
    }

    fn update_interval(&self) -> Option<f64> {
        self.update_interval
    }

    fn has_pending_work(&self) -> bool {
        self.completed < self.expected
    }

    fn load(&self) -> usize {
        self.load
    }

    fn metrics(&self) -> Metrics {
        self.metrics
    }

    fn take_tasks(&mut self) -> Vec<Task> {
        std::mem::take(&mut self.retained)
    }
}

use std::collections::{BTreeMap, VecDeque};

use crate::context::Context;
use crate::error::{ConsistencyError, HandlerResult};
use crate::event::{ClientId, EventKind, EventPayload};
use crate::log::LogEntry;
use crate::task::{Message, MessageKind, SlaveLoad, Task, TaskKey, TaskState};

use super::{Metrics, ServiceCenter};

struct Running {
    started: f64,
    size: f64,
}

/// Processing machine with a number of identical cores and a FIFO waiting line.
pub struct Machine {
    power: f64,
    cores: u32,
    occupancy: f64,
    busy_cores: u32,
    running: BTreeMap<TaskKey, Running>,
    waiting: VecDeque<Box<Task>>,
    cancelled: Vec<Task>,
    metrics: Metrics,
}

impl Machine {
    /// Creates an idle machine.
    pub fn new(power: f64, cores: u32, occupancy: f64) -> Self {
        Self {
            power,
            cores,
            occupancy,
            busy_cores: 0,
            running: BTreeMap::new(),
            waiting: VecDeque::new(),
            cancelled: Vec::new(),
            metrics: Metrics::default(),
        }
    }

    /// Effective processing rate of one core in Mflop/s.
    pub fn rate(&self) -> f64 {
        self.power * (1. - self.occupancy)
    }

    /// Returns the number of tasks waiting for a core.
    pub fn waiting(&self) -> usize {
        self.waiting.len()
    }

    /// Returns the load snapshot reported to masters.
    pub fn snapshot(&self, time: f64) -> SlaveLoad {
        let rate = self.rate();
        let running_work: f64 = self
            .running
            .values()
            .map(|r| (r.size - (time - r.started) * rate).max(0.))
            .sum();
        let waiting_work: f64 = self.waiting.iter().map(|t| t.processing_size()).sum();
        SlaveLoad {
            time,
            waiting: self.waiting.len(),
            // reserved cores whose service has not started yet count as running
            running: self.busy_cores as usize,
            remaining_work: running_work + waiting_work,
        }
    }

    fn start_next(&mut self, ctx: &mut Context) {
        if self.busy_cores < self.cores {
            if let Some(task) = self.waiting.pop_front() {
                self.busy_cores += 1;
                ctx.emit_self_now(EventPayload::Service(task));
            }
        }
    }

    fn retract(&mut self, mut task: Task, ctx: &mut Context) {
        task.cancel(ctx.time());
        self.metrics.cancelled += 1;
        ctx.log(LogEntry::TaskCancelled {
            time: ctx.time(),
            center: ctx.name().to_owned(),
            task: task.key(),
        });
        self.cancelled.push(task);
    }

    fn cancel_task(&mut self, key: TaskKey, ctx: &mut Context) {
        if let Some(pos) = self.waiting.iter().position(|t| t.key() == key) {
            if let Some(task) = self.waiting.remove(pos) {
                self.retract(*task, ctx);
            }
            return;
        }

        let client = Some(ClientId::Task(key));
        let removed = ctx
            .cancel(EventKind::Service, client)
            .or_else(|| ctx.cancel(EventKind::Departure, client));
        let Some(event) = removed else {
            // already processed, the result is on its way back
            return;
        };
        if let EventPayload::Service(task) | EventPayload::Departure(task) = event.into_payload() {
            if let Some(running) = self.running.remove(&key) {
                self.metrics.busy_seconds += ctx.time() - running.started;
            }
            self.busy_cores = self.busy_cores.saturating_sub(1);
            self.retract(*task, ctx);
            self.start_next(ctx);
        }
    }
}

impl ServiceCenter for Machine {
    fn on_arrival(&mut self, task: Box<Task>, ctx: &mut Context) -> HandlerResult {
        if !task.path().is_empty() {
            return Err(ConsistencyError::UnexpectedHop {
                center: ctx.name().to_owned(),
                task: task.key(),
                remaining: task.path().len(),
            });
        }
        ctx.log(LogEntry::TaskArrived {
            time: ctx.time(),
            center: ctx.name().to_owned(),
            task: task.key(),
        });
        if self.busy_cores < self.cores {
            self.busy_cores += 1;
            ctx.emit_self_now(EventPayload::Service(task));
        } else {
            self.waiting.push_back(task);
        }
        Ok(())
    }

    fn on_service_begin(&mut self, mut task: Box<Task>, ctx: &mut Context) -> HandlerResult {
        task.begin_processing(ctx.time());
        self.running.insert(
            task.key(),
            Running {
                started: ctx.time(),
                size: task.processing_size(),
            },
        );
        ctx.log(LogEntry::ServiceStarted {
            time: ctx.time(),
            center: ctx.name().to_owned(),
            task: task.key(),
        });
        let delay = task.processing_size() / self.rate();
        ctx.emit_self(EventPayload::Departure(task), delay);
        Ok(())
    }

    fn on_departure(&mut self, mut task: Box<Task>, ctx: &mut Context) -> HandlerResult {
        let duration = self
            .running
            .remove(&task.key())
            .map_or(0., |running| ctx.time() - running.started);
        self.busy_cores = self.busy_cores.saturating_sub(1);
        self.metrics.record_service(task.processing_size(), duration);
        task.end_processing(ctx.time());
        ctx.log(LogEntry::ServiceFinished {
            time: ctx.time(),
            center: ctx.name().to_owned(),
            task: task.key(),
            duration,
        });

        let route = ctx.route(ctx.id(), task.origin())?;
        task.set_route(route, TaskState::Processed);
        let next = task.next_hop().ok_or_else(|| ConsistencyError::DanglingPath {
            center: ctx.name().to_owned(),
            client: format!("task {}", task.key()),
        })?;
        ctx.emit_now(EventPayload::Arrival(task), next);

        self.start_next(ctx);
        Ok(())
    }

    fn on_message(&mut self, message: Box<Message>, ctx: &mut Context) -> HandlerResult {
        ctx.log(LogEntry::MessageReceived {
            time: ctx.time(),
            msg_id: message.id(),
            kind: message.kind(),
            center: ctx.name().to_owned(),
        });
        match message.kind() {
            MessageKind::Update => {
                let route = ctx.route(ctx.id(), message.master())?;
                let reply = Message::new(ctx.next_message_id(), MessageKind::UpdateResult, message.master(), ctx.id())
                    .with_load(self.snapshot(ctx.time()))
                    .with_route(route);
                ctx.send(reply)
            }
            MessageKind::Cancel => {
                if let Some(key) = message.task() {
                    self.cancel_task(key, ctx);
                }
                Ok(())
            }
            MessageKind::UpdateResult => Err(ConsistencyError::UnexpectedEvent {
                center: ctx.name().to_owned(),
                kind: EventKind::Message,
                reason: "update results are addressed to masters".to_owned(),
            }),
        }
    }

    fn load(&self) -> usize {
        self.busy_cores as usize + self.waiting.len()
    }

    fn metrics(&self) -> Metrics {
        self.metrics
    }

    fn take_tasks(&mut self) -> Vec<Task> {
        std::mem::take(&mut self.cancelled)
    }
}

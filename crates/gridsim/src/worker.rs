//! Execution unit draining the event queue of one service center.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::center::ServiceCenter;
use crate::context::Context;
use crate::error::HandlerResult;
use crate::event::{EventPayload, FutureEvent};
use crate::log::LogEntry;
use crate::simulation::Engine;
use crate::topology::CenterId;

// Trace entries buffered by an activation before they are handed to the logger.
const TRACE_BATCH: usize = 1024;

struct State {
    center: Box<dyn ServiceCenter>,
    next_tick: Option<f64>,
}

/// Owner of one service center and its local clock.
///
/// A worker is either idle or running. The running flag is taken with a compare-and-swap, so a center is never
/// activated twice at the same time and its handlers run sequentially.
pub struct Worker {
    id: CenterId,
    running: AtomicBool,
    clock: AtomicU64,
    update_interval: Option<f64>,
    state: Mutex<State>,
}

impl Worker {
    /// Creates an idle worker at time zero.
    pub fn new(id: CenterId, center: Box<dyn ServiceCenter>) -> Self {
        let update_interval = center.update_interval();
        Self {
            id,
            running: AtomicBool::new(false),
            clock: AtomicU64::new(0f64.to_bits()),
            update_interval,
            state: Mutex::new(State {
                center,
                next_tick: update_interval,
            }),
        }
    }

    /// Returns the id of the owned center.
    pub fn id(&self) -> CenterId {
        self.id
    }

    /// Returns the local clock.
    pub fn clock(&self) -> f64 {
        f64::from_bits(self.clock.load(Ordering::Acquire))
    }

    /// Returns true while an activation drains the queue.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs `f` on the owned center.
    pub fn with_center<R>(&self, f: impl FnOnce(&mut dyn ServiceCenter) -> R) -> R {
        f(self.state.lock().center.as_mut())
    }

    pub(crate) fn try_acquire(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Drains the queue of the center until it is empty or the simulation halts, then goes idle.
    pub(crate) fn run(&self, engine: &Engine) {
        let mut trace = Vec::new();
        {
            let mut state = self.state.lock();
            while !engine.is_halted() {
                let Some(event) = engine.queue(self.id).pop() else {
                    break;
                };
                let result = self.handle(&mut state, engine, event, &mut trace);
                engine.event_done();
                if trace.len() >= TRACE_BATCH {
                    engine.record(&mut trace);
                }
                if let Err(e) = result {
                    engine.halt(e);
                    break;
                }
            }
        }
        // entries of one center reach the logger in the order they were produced
        engine.record(&mut trace);
        self.running.store(false, Ordering::Release);
    }

    fn advance(&self, time: f64) -> f64 {
        let now = self.clock().max(time);
        self.clock.store(now.to_bits(), Ordering::Release);
        now
    }

    fn fire_ticks(&self, state: &mut State, engine: &Engine, until: f64, trace: &mut Vec<LogEntry>) -> HandlerResult {
        let Some(interval) = self.update_interval else {
            return Ok(());
        };
        while let Some(tick) = state.next_tick {
            if tick >= until || !state.center.has_pending_work() {
                break;
            }
            let now = self.advance(tick);
            state.center.on_tick(&mut Context::new(engine, self.id, now, trace))?;
            state.next_tick = Some(tick + interval);
        }
        Ok(())
    }

    fn handle(
        &self,
        state: &mut State,
        engine: &Engine,
        event: FutureEvent,
        trace: &mut Vec<LogEntry>,
    ) -> HandlerResult {
        self.fire_ticks(state, engine, event.time(), trace)?;
        let now = self.advance(event.time());
        let mut ctx = Context::new(engine, self.id, now, trace);
        let center = &mut state.center;
        match event.into_payload() {
            EventPayload::Arrival(task) => center.on_arrival(task, &mut ctx),
            EventPayload::Service(task) => center.on_service_begin(task, &mut ctx),
            EventPayload::Departure(task) => center.on_departure(task, &mut ctx),
            EventPayload::Schedule => center.on_schedule(&mut ctx),
            EventPayload::Message(message) => center.on_message(message, &mut ctx),
        }
    }
}

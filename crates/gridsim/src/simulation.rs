//! Simulation coordinator.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Condvar, Mutex};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::center::{build_center, Master};
use crate::config::SimulationConfig;
use crate::error::{ConfigError, ConsistencyError, SimulationError};
use crate::event::{ClientId, EventKind, EventPayload, FutureEvent};
use crate::log::{LogEntry, Logger};
use crate::progress::{ConsoleProgress, SimulationProgress, Tone};
use crate::queue::EventQueue;
use crate::report::{CenterReport, SimulationResult};
use crate::task::Task;
use crate::topology::{CenterId, CenterKind, RoutingTable, Topology};
use crate::worker::Worker;

const ROUTING_PROGRESS: u32 = 10;
const TASKS_PROGRESS: u32 = 80;
const FINAL_PROGRESS: u32 = 10;

/// State shared by the coordinator and all workers.
pub(crate) struct Engine {
    topology: Arc<Topology>,
    routes: OnceLock<RoutingTable>,
    queues: Vec<EventQueue>,
    pending: AtomicUsize,
    active: AtomicUsize,
    dirty: Mutex<bool>,
    wakeup: Condvar,
    halted: AtomicBool,
    failure: Mutex<Option<ConsistencyError>>,
    logger: Mutex<Logger>,
    recording: bool,
    progress: Arc<dyn SimulationProgress>,
    next_message_id: AtomicU64,
    total_tasks: AtomicUsize,
    completed: AtomicUsize,
    reported: AtomicU32,
}

impl Engine {
    pub(crate) fn topology(&self) -> &Topology {
        &self.topology
    }

    pub(crate) fn queue(&self, id: CenterId) -> &EventQueue {
        &self.queues[id.0]
    }

    pub(crate) fn push(&self, event: FutureEvent) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.queues[event.target().0].push(event);
        self.notify();
    }

    pub(crate) fn event_done(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn cancel(&self, center: CenterId, kind: EventKind, client: Option<ClientId>) -> Option<FutureEvent> {
        let event = self.queues.get(center.0)?.remove(kind, client)?;
        self.pending.fetch_sub(1, Ordering::AcqRel);
        Some(event)
    }

    pub(crate) fn route(&self, from: CenterId, to: CenterId) -> Result<&[CenterId], ConsistencyError> {
        self.routes
            .get()
            .and_then(|routes| routes.route(from, to))
            .ok_or_else(|| ConsistencyError::MissingRoute {
                from: self.topology.name(from).to_owned(),
                to: self.topology.name(to).to_owned(),
            })
    }

    pub(crate) fn next_message_id(&self) -> u64 {
        self.next_message_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn log(&self, entry: LogEntry) {
        self.logger.lock().log(entry);
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.recording
    }

    /// Hands a batch of printed entries to the logger, leaving `trace` empty.
    pub(crate) fn record(&self, trace: &mut Vec<LogEntry>) {
        if !trace.is_empty() {
            self.logger.lock().record(trace.drain(..));
        }
    }

    pub(crate) fn task_completed(&self) {
        let done = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        let total = self.total_tasks.load(Ordering::Acquire).max(1);
        let percent = (TASKS_PROGRESS as usize * done.min(total) / total) as u32;
        let before = self.reported.fetch_max(percent, Ordering::AcqRel);
        if percent > before {
            self.progress.inc_progress(percent - before);
        }
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    pub(crate) fn halt(&self, error: ConsistencyError) {
        log::error!("simulation halted: {}", error);
        self.failure.lock().get_or_insert(error);
        self.halted.store(true, Ordering::Release);
        self.notify();
    }

    fn notify(&self) {
        *self.dirty.lock() = true;
        self.wakeup.notify_all();
    }

    fn activation_finished(&self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
        self.notify();
    }

    fn is_quiescent(&self) -> bool {
        self.active.load(Ordering::Acquire) == 0
            && (self.is_halted() || self.pending.load(Ordering::Acquire) == 0)
    }
}

/// Parallel discrete-event simulation of a grid.
///
/// Every service center has its own event queue, local clock and worker. Workers are activated on a fixed thread
/// pool whenever their queue is not empty, and the coordinator waits until no event is pending anywhere.
pub struct Simulation {
    engine: Engine,
    workers: Vec<Worker>,
    pool: ThreadPool,
    config: SimulationConfig,
    tasks: Vec<Task>,
}

impl Simulation {
    /// Creates a simulation reporting progress to the console.
    pub fn new(topology: Topology, tasks: Vec<Task>, config: SimulationConfig) -> Result<Self, ConfigError> {
        Self::with_progress(topology, tasks, config, Arc::new(ConsoleProgress::new()))
    }

    /// Creates a simulation reporting progress to the given receiver.
    pub fn with_progress(
        topology: Topology,
        tasks: Vec<Task>,
        config: SimulationConfig,
        progress: Arc<dyn SimulationProgress>,
    ) -> Result<Self, ConfigError> {
        let masters = topology.masters();
        if masters.is_empty() {
            return Err(ConfigError::NoMasters);
        }
        if tasks.is_empty() {
            return Err(ConfigError::EmptyWorkload);
        }
        for task in &tasks {
            let origin = task.origin();
            if origin.0 >= topology.len() || topology.kind(origin) != CenterKind::Master {
                let center = if origin.0 < topology.len() {
                    topology.name(origin).to_owned()
                } else {
                    origin.to_string()
                };
                return Err(ConfigError::InvalidOrigin {
                    task: task.family(),
                    center,
                });
            }
        }
        if topology.communication_centers().is_empty() {
            progress.println("The model has no networks.", Tone::Warn);
        }
        if topology.machines().is_empty() {
            progress.println("The model has no processing slaves.", Tone::Warn);
        }
        for master in masters {
            let has_tasks = tasks.iter().any(|t| t.origin() == master);
            if has_tasks && topology.slaves(master).is_empty() {
                return Err(ConfigError::NoSlaves(topology.name(master).to_owned()));
            }
        }

        let logger = match &config.log_file {
            Some(path) => Logger::with_log_file(path)?,
            None => Logger::new(),
        }
        .keep_trace(config.trace);
        let recording = logger.is_recording();
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads.max(1))
            .thread_name(|i| format!("gridsim-{}", i))
            .build()
            .map_err(|e| ConfigError::ThreadPool(e.to_string()))?;

        let workers = topology
            .ids()
            .map(|id| Worker::new(id, build_center(&topology, id)))
            .collect();
        let queues = topology.ids().map(|_| EventQueue::new()).collect();

        Ok(Self {
            engine: Engine {
                topology: Arc::new(topology),
                routes: OnceLock::new(),
                queues,
                pending: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                dirty: Mutex::new(false),
                wakeup: Condvar::new(),
                halted: AtomicBool::new(false),
                failure: Mutex::new(None),
                logger: Mutex::new(logger),
                recording,
                progress,
                next_message_id: AtomicU64::new(0),
                total_tasks: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
                reported: AtomicU32::new(0),
            },
            workers,
            pool,
            config,
            tasks,
        })
    }

    /// Returns the topology.
    pub fn topology(&self) -> &Topology {
        self.engine.topology()
    }

    /// Returns the precomputed routes, once [`Simulation::initialize`] succeeded.
    pub fn routes(&self) -> Option<&RoutingTable> {
        self.engine.routes.get()
    }

    /// Computes the routes between masters and slaves.
    ///
    /// All routes are computed in parallel and joined before returning. Calling it again has no effect.
    pub fn initialize(&mut self) -> Result<(), ConfigError> {
        if self.engine.routes.get().is_some() {
            return Ok(());
        }
        let progress = &self.engine.progress;
        progress.print("Creating routing.", Tone::Info);
        let topology = &self.engine.topology;
        let metric = self.config.routing;
        let table = match self.pool.install(|| RoutingTable::build(topology, metric)) {
            Ok(table) => table,
            Err(e) => {
                progress.println(" Failed", Tone::Warn);
                return Err(e);
            }
        };
        log::debug!("computed {} routes", table.len());
        let _ = self.engine.routes.set(table);
        progress.println(" OK", Tone::Success);
        progress.inc_progress(ROUTING_PROGRESS);
        Ok(())
    }

    /// Enqueues the arrival of every task at its master and announces the task counts to the masters.
    pub fn seed_initial_events(&mut self) {
        let tasks = std::mem::take(&mut self.tasks);
        if tasks.is_empty() {
            return;
        }
        self.engine.total_tasks.fetch_add(tasks.len(), Ordering::AcqRel);
        for worker in &self.workers {
            let count = tasks.iter().filter(|t| t.origin() == worker.id()).count();
            if count > 0 {
                worker.with_center(|center| {
                    if let Some(master) = center.downcast_mut::<Master>() {
                        master.expect_tasks(count);
                    }
                });
            }
        }
        for task in tasks {
            let event = FutureEvent::new(task.created_at(), task.origin(), EventPayload::Arrival(Box::new(task)));
            self.engine.push(event);
        }
    }

    /// Runs until no event is pending.
    ///
    /// Once a run has been halted by a consistency error, every later call returns that error again.
    pub fn run(&mut self) -> Result<SimulationResult, SimulationError> {
        self.initialize()?;
        let engine = &self.engine;
        let workers = &self.workers;

        self.pool.in_place_scope(|scope| loop {
            for worker in workers {
                if engine.is_halted() {
                    break;
                }
                if !engine.queue(worker.id()).is_empty() && worker.try_acquire() {
                    engine.active.fetch_add(1, Ordering::AcqRel);
                    scope.spawn(move |_| {
                        worker.run(engine);
                        engine.activation_finished();
                    });
                }
            }

            let mut dirty = engine.dirty.lock();
            loop {
                if engine.is_quiescent() {
                    return;
                }
                if *dirty {
                    *dirty = false;
                    break;
                }
                engine.wakeup.wait(&mut dirty);
            }
        });

        if let Err(e) = self.engine.logger.lock().flush() {
            log::warn!("failed to flush event log: {}", e);
        }

        let failure = self.engine.failure.lock().clone();
        if let Some(error) = failure {
            self.engine
                .progress
                .println(&format!("Simulation aborted: {}", error), Tone::Warn);
            return Err(error.into());
        }

        let result = self.collect();
        self.engine.progress.inc_progress(FINAL_PROGRESS);
        self.engine.progress.println("Simulation completed.", Tone::Success);
        Ok(result)
    }

    /// Initializes, seeds and runs the simulation.
    pub fn simulate(&mut self) -> Result<SimulationResult, SimulationError> {
        self.initialize()?;
        self.seed_initial_events();
        self.run()
    }

    /// Returns the local clock of a center, or the largest clock of all centers.
    ///
    /// Returns `None` if the center does not belong to the topology.
    pub fn current_time(&self, center: Option<CenterId>) -> Option<f64> {
        match center {
            Some(id) => self.workers.get(id.0).map(|w| w.clock()),
            None => Some(self.latest_clock()),
        }
    }

    fn latest_clock(&self) -> f64 {
        self.workers.iter().map(|w| w.clock()).fold(0., f64::max)
    }

    /// Removes the earliest pending event of `center` with the given kind and client.
    ///
    /// Returns false if there is no such event, e.g. because it has already been processed or the center is unknown.
    pub fn cancel_event(&self, kind: EventKind, center: CenterId, client: Option<ClientId>) -> bool {
        let Some(time) = self.current_time(Some(center)) else {
            return false;
        };
        if self.engine.cancel(center, kind, client).is_none() {
            return false;
        }
        self.engine.log(LogEntry::EventCancelled {
            time,
            center: self.topology().name(center).to_owned(),
            kind,
            client: client.map_or_else(String::new, |c| c.to_string()),
        });
        true
    }

    /// Returns the number of events waiting in all queues.
    pub fn pending_events(&self) -> usize {
        self.engine.pending.load(Ordering::Acquire)
    }

    /// Returns a copy of the event trace, which is empty unless [`SimulationConfig::trace`] is set.
    pub fn trace(&self) -> Vec<LogEntry> {
        self.engine.logger.lock().trace().clone()
    }

    fn collect(&mut self) -> SimulationResult {
        let topology = self.engine.topology.clone();
        let mut tasks = Vec::new();
        let mut completed = 0;
        let centers = self
            .workers
            .iter()
            .map(|worker| {
                worker.with_center(|center| {
                    tasks.extend(center.take_tasks());
                    if let Some(master) = center.downcast_ref::<Master>() {
                        completed += master.completed();
                    }
                    let metrics = center.metrics();
                    CenterReport {
                        name: topology.name(worker.id()).to_owned(),
                        kind: topology.kind(worker.id()),
                        units: metrics.units,
                        busy_seconds: metrics.busy_seconds,
                        services: metrics.services,
                        cancelled: metrics.cancelled,
                        clock: worker.clock(),
                    }
                })
            })
            .collect();
        tasks.sort_by_key(|t| t.key());

        SimulationResult {
            final_time: self.latest_clock(),
            centers,
            tasks,
            completed,
        }
    }
}

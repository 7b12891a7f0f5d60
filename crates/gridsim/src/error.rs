//! Error types of the simulator.

use thiserror::Error;

use crate::event::EventKind;
use crate::task::TaskKey;

/// Fatal problems in the simulation input, detected before simulated time advances.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The model does not contain any master.
    #[error("the model has no masters")]
    NoMasters,

    /// The workload does not contain any task.
    #[error("one or more workloads have not been configured")]
    EmptyWorkload,

    /// A center name does not refer to any center of the topology.
    #[error("unknown center '{0}'")]
    UnknownCenter(String),

    /// Two centers share the same name.
    #[error("duplicate center '{0}'")]
    DuplicateCenter(String),

    /// A master lists a slave which is not a machine.
    #[error("slave '{slave}' of master '{master}' is not a machine")]
    NotAMachine {
        /// Master name.
        master: String,
        /// Offending slave name.
        slave: String,
    },

    /// A master owns tasks but has no slave to run them.
    #[error("master '{0}' has tasks but no slaves")]
    NoSlaves(String),

    /// There is no path between two centers that must communicate.
    #[error("no route from '{from}' to '{to}'")]
    NoRoute {
        /// Source center name.
        from: String,
        /// Destination center name.
        to: String,
    },

    /// A task does not originate at a master.
    #[error("task {task} originates at '{center}', which is not a master")]
    InvalidOrigin {
        /// Task id.
        task: u64,
        /// Origin center name.
        center: String,
    },

    /// A capacity or size parameter is out of range.
    #[error("invalid parameter of '{center}': {reason}")]
    InvalidParameter {
        /// Center (or workload group) name.
        center: String,
        /// Human readable reason.
        reason: String,
    },

    /// The worker thread pool could not be built.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),

    /// Model or log file could not be accessed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Model description could not be parsed.
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
}

/// Broken invariants of the event-generation logic, detected while the simulation runs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConsistencyError {
    /// A communication center has nowhere to forward a client to.
    #[error("{client} has no next hop after leaving '{center}'")]
    DanglingPath {
        /// Center name.
        center: String,
        /// Description of the client.
        client: String,
    },

    /// A client reached an end point while its path is not consumed.
    #[error("task {task} reached '{center}' with {remaining} hops left")]
    UnexpectedHop {
        /// Center name.
        center: String,
        /// Task key.
        task: TaskKey,
        /// Remaining hops.
        remaining: usize,
    },

    /// An event kind the center cannot handle.
    #[error("'{center}' cannot handle {kind:?} event: {reason}")]
    UnexpectedEvent {
        /// Center name.
        center: String,
        /// Event kind.
        kind: EventKind,
        /// Human readable reason.
        reason: String,
    },

    /// A master received a client from a machine it does not own.
    #[error("master '{master}' does not own slave '{slave}'")]
    UnknownSlave {
        /// Master name.
        master: String,
        /// Slave name.
        slave: String,
    },

    /// The routing table has no entry for a pair of centers.
    #[error("no precomputed route from '{from}' to '{to}'")]
    MissingRoute {
        /// Source center name.
        from: String,
        /// Destination center name.
        to: String,
    },
}

/// Any error which aborts a simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Invalid input.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid state reached during the run.
    #[error("consistency error: {0}")]
    Consistency(#[from] ConsistencyError),
}

/// Result of the handlers invoked during the run.
pub type HandlerResult = Result<(), ConsistencyError>;

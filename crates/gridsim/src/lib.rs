#![warn(missing_docs)]
#![doc = include_str!("../readme.md")]

pub mod center;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod log;
pub mod progress;
pub mod queue;
pub mod report;
pub mod scheduler;
pub mod simulation;
pub mod task;
pub mod topology;
pub mod worker;
pub mod workload;

pub use config::{ModelConfig, SimulationConfig};
pub use error::{ConfigError, ConsistencyError, SimulationError};
pub use report::SimulationResult;
pub use simulation::Simulation;
pub use task::{Task, TaskKey};
pub use topology::{CenterId, Topology, TopologyBuilder};

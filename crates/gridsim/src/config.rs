//! Run parameters and the serializable model description.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scheduler::PolicyKind;
use crate::task::Task;
use crate::topology::{CenterId, RoutingMetric, Topology, TopologyBuilder};
use crate::workload::WorkloadConfig;

/// Parameters of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of threads executing workers.
    pub threads: usize,
    /// Cost model used to compute routes.
    pub routing: RoutingMetric,
    /// File receiving the event trace as JSON lines.
    pub log_file: Option<PathBuf>,
    /// Seed of generated workloads.
    pub seed: u64,
    /// Keep the event trace in memory for [`Simulation::trace`](crate::simulation::Simulation::trace).
    pub trace: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism().map_or(1, |n| n.get()),
            routing: RoutingMetric::default(),
            log_file: None,
            seed: 123,
            trace: false,
        }
    }
}

impl SimulationConfig {
    /// Sets the number of threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the routing metric.
    pub fn with_routing(mut self, routing: RoutingMetric) -> Self {
        self.routing = routing;
        self
    }

    /// Sets the event trace file.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Sets the workload seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets whether the event trace is kept in memory.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}

fn one() -> u32 {
    1
}

/// Description of a service center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CenterConfig {
    /// Processing machine.
    Machine {
        /// Unique name.
        name: String,
        /// Mflop/s of one core.
        power: f64,
        /// Number of cores.
        #[serde(default = "one")]
        cores: u32,
        /// Fraction of the power used by foreign load.
        #[serde(default)]
        occupancy: f64,
    },
    /// Network link.
    Link {
        /// Unique name.
        name: String,
        /// Mbit/s.
        bandwidth: f64,
        /// Fraction of the bandwidth used by foreign traffic.
        #[serde(default)]
        occupancy: f64,
        /// Seconds added to every transmission.
        #[serde(default)]
        latency: f64,
    },
    /// Internet hub.
    Internet {
        /// Unique name.
        name: String,
        /// Mbit/s.
        bandwidth: f64,
        /// Fraction of the bandwidth used by foreign traffic.
        #[serde(default)]
        occupancy: f64,
        /// Seconds added to every transmission.
        #[serde(default)]
        latency: f64,
    },
    /// Network switch.
    Switch {
        /// Unique name.
        name: String,
        /// Mbit/s.
        bandwidth: f64,
        /// Fraction of the bandwidth used by foreign traffic.
        #[serde(default)]
        occupancy: f64,
        /// Seconds added to every transmission.
        #[serde(default)]
        latency: f64,
    },
    /// Master.
    Master {
        /// Unique name.
        name: String,
        /// Mflop/s.
        power: f64,
        /// Scheduling policy.
        #[serde(default)]
        policy: PolicyKind,
        /// Interval of dynamic updates.
        #[serde(default)]
        update_interval: Option<f64>,
        /// Names of slave machines.
        #[serde(default)]
        slaves: Vec<String>,
    },
}

/// Connection between two centers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Source center name.
    pub from: String,
    /// Destination center name.
    pub to: String,
    /// Adds the reverse connection too.
    #[serde(default)]
    pub bidirectional: bool,
}

/// Serializable topology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Service centers.
    pub centers: Vec<CenterConfig>,
    /// Connections between centers.
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

impl TopologyConfig {
    /// Builds and validates the topology.
    pub fn build(&self) -> Result<Topology, ConfigError> {
        let mut builder = TopologyBuilder::new();
        let mut ids: HashMap<&str, CenterId> = HashMap::new();
        let mut masters = Vec::new();

        for center in &self.centers {
            let (name, id) = match center {
                CenterConfig::Machine {
                    name,
                    power,
                    cores,
                    occupancy,
                } => (name, builder.add_machine(name, *power, *cores, *occupancy)),
                CenterConfig::Link {
                    name,
                    bandwidth,
                    occupancy,
                    latency,
                } => (name, builder.add_link(name, *bandwidth, *occupancy, *latency)),
                CenterConfig::Internet {
                    name,
                    bandwidth,
                    occupancy,
                    latency,
                } => (name, builder.add_internet(name, *bandwidth, *occupancy, *latency)),
                CenterConfig::Switch {
                    name,
                    bandwidth,
                    occupancy,
                    latency,
                } => (name, builder.add_switch(name, *bandwidth, *occupancy, *latency)),
                CenterConfig::Master {
                    name,
                    power,
                    policy,
                    update_interval,
                    slaves,
                } => {
                    let id = builder.add_master(name, *power, *policy, *update_interval);
                    masters.push((id, slaves));
                    (name, id)
                }
            };
            ids.entry(name.as_str()).or_insert(id);
        }

        let lookup = |name: &str| ids.get(name).copied().ok_or_else(|| ConfigError::UnknownCenter(name.to_owned()));
        for (master, slaves) in masters {
            for slave in slaves {
                builder.add_slave(master, lookup(slave)?);
            }
        }
        for connection in &self.connections {
            let from = lookup(&connection.from)?;
            let to = lookup(&connection.to)?;
            if connection.bidirectional {
                builder.connect_both(from, to);
            } else {
                builder.connect(from, to);
            }
        }
        builder.build()
    }
}

/// Complete model: topology and workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Queueing network.
    pub topology: TopologyConfig,
    /// Tasks submitted to the masters.
    pub workload: WorkloadConfig,
}

impl ModelConfig {
    /// Parses a model from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a model from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Builds the topology and generates the tasks.
    pub fn build(&self, seed: u64) -> Result<(Topology, Vec<Task>), ConfigError> {
        let topology = self.topology.build()?;
        let tasks = self.workload.build(&topology, seed)?;
        Ok((topology, tasks))
    }
}

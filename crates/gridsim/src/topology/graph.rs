//! Directed graph of service centers.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scheduler::PolicyKind;

/// Dense index of a service center inside the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CenterId(pub usize);

impl fmt::Display for CenterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Variant of a service center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CenterKind {
    /// Processing machine.
    Machine,
    /// Point-to-point network link.
    Link,
    /// Wide area network hub.
    Internet,
    /// Local network switch.
    Switch,
    /// Scheduler which owns slave machines.
    Master,
}

impl CenterKind {
    /// Returns true for centers which only transmit data and may be intermediate hops of a path.
    pub fn is_communication(&self) -> bool {
        matches!(self, CenterKind::Link | CenterKind::Internet | CenterKind::Switch)
    }
}

impl fmt::Display for CenterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CenterKind::Machine => "machine",
            CenterKind::Link => "link",
            CenterKind::Internet => "internet",
            CenterKind::Switch => "switch",
            CenterKind::Master => "master",
        };
        f.write_str(name)
    }
}

/// Capacity and configuration of a service center.
#[derive(Debug, Clone, PartialEq)]
pub enum CenterParams {
    /// Processing machine.
    Machine {
        /// Computational power of one core in Mflop/s.
        power: f64,
        /// Number of cores.
        cores: u32,
        /// Fraction of the capacity consumed by foreign load.
        occupancy: f64,
    },
    /// Link, internet or switch.
    Communication {
        /// Bandwidth in Mbit/s.
        bandwidth: f64,
        /// Fraction of the bandwidth consumed by foreign traffic.
        occupancy: f64,
        /// Latency in seconds added to every transmission.
        latency: f64,
    },
    /// Master.
    Master {
        /// Computational power in Mflop/s.
        power: f64,
        /// Scheduling policy.
        policy: PolicyKind,
        /// Interval between dynamic updates, `None` for static scheduling.
        update_interval: Option<f64>,
        /// Owned slave machines.
        slaves: Vec<CenterId>,
    },
}

/// Immutable description of a service center.
#[derive(Debug, Clone, PartialEq)]
pub struct CenterSpec {
    /// Unique name.
    pub name: String,
    /// Variant.
    pub kind: CenterKind,
    /// Capacity and configuration.
    pub params: CenterParams,
}

/// Directed graph of service centers, immutable once built.
#[derive(Debug, Clone)]
pub struct Topology {
    centers: Vec<CenterSpec>,
    outbound: Vec<Vec<CenterId>>,
    inbound: Vec<Vec<CenterId>>,
    names: HashMap<String, CenterId>,
}

impl Topology {
    /// Returns the number of centers.
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    /// Returns true if the topology has no centers.
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Returns ids of all centers.
    pub fn ids(&self) -> impl Iterator<Item = CenterId> + '_ {
        (0..self.centers.len()).map(CenterId)
    }

    /// Returns the description of a center.
    pub fn center(&self, id: CenterId) -> &CenterSpec {
        &self.centers[id.0]
    }

    /// Returns the name of a center.
    pub fn name(&self, id: CenterId) -> &str {
        &self.centers[id.0].name
    }

    /// Returns the variant of a center.
    pub fn kind(&self, id: CenterId) -> CenterKind {
        self.centers[id.0].kind
    }

    /// Looks a center up by name.
    pub fn find(&self, name: &str) -> Option<CenterId> {
        self.names.get(name).copied()
    }

    /// Returns outbound connections in insertion order.
    pub fn outbound(&self, id: CenterId) -> &[CenterId] {
        &self.outbound[id.0]
    }

    /// Returns inbound connections in insertion order.
    pub fn inbound(&self, id: CenterId) -> &[CenterId] {
        &self.inbound[id.0]
    }

    /// Returns ids of all centers of the given kind.
    pub fn of_kind(&self, kind: CenterKind) -> Vec<CenterId> {
        self.ids().filter(|id| self.kind(*id) == kind).collect()
    }

    /// Returns ids of all masters.
    pub fn masters(&self) -> Vec<CenterId> {
        self.of_kind(CenterKind::Master)
    }

    /// Returns ids of all machines.
    pub fn machines(&self) -> Vec<CenterId> {
        self.of_kind(CenterKind::Machine)
    }

    /// Returns ids of all links, internet hubs and switches.
    pub fn communication_centers(&self) -> Vec<CenterId> {
        self.ids().filter(|id| self.kind(*id).is_communication()).collect()
    }

    /// Returns slaves of a master, or an empty slice for other centers.
    pub fn slaves(&self, master: CenterId) -> &[CenterId] {
        match &self.centers[master.0].params {
            CenterParams::Master { slaves, .. } => slaves,
            _ => &[],
        }
    }

    /// Returns masters which own the given machine.
    pub fn masters_of(&self, machine: CenterId) -> Vec<CenterId> {
        self.masters()
            .into_iter()
            .filter(|master| self.slaves(*master).contains(&machine))
            .collect()
    }
}

/// Incremental constructor of a [`Topology`].
///
/// Ids are handed out immediately, validation happens in [`TopologyBuilder::build`].
#[derive(Default)]
pub struct TopologyBuilder {
    centers: Vec<CenterSpec>,
    connections: Vec<(CenterId, CenterId)>,
}

impl TopologyBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, name: &str, kind: CenterKind, params: CenterParams) -> CenterId {
        self.centers.push(CenterSpec {
            name: name.to_owned(),
            kind,
            params,
        });
        CenterId(self.centers.len() - 1)
    }

    /// Adds a processing machine.
    pub fn add_machine(&mut self, name: &str, power: f64, cores: u32, occupancy: f64) -> CenterId {
        self.add(
            name,
            CenterKind::Machine,
            CenterParams::Machine {
                power,
                cores,
                occupancy,
            },
        )
    }

    /// Adds a communication center of the given kind.
    pub fn add_communication(
        &mut self,
        name: &str,
        kind: CenterKind,
        bandwidth: f64,
        occupancy: f64,
        latency: f64,
    ) -> CenterId {
        self.add(
            name,
            kind,
            CenterParams::Communication {
                bandwidth,
                occupancy,
                latency,
            },
        )
    }

    /// Adds a network link.
    pub fn add_link(&mut self, name: &str, bandwidth: f64, occupancy: f64, latency: f64) -> CenterId {
        self.add_communication(name, CenterKind::Link, bandwidth, occupancy, latency)
    }

    /// Adds an internet hub.
    pub fn add_internet(&mut self, name: &str, bandwidth: f64, occupancy: f64, latency: f64) -> CenterId {
        self.add_communication(name, CenterKind::Internet, bandwidth, occupancy, latency)
    }

    /// Adds a switch.
    pub fn add_switch(&mut self, name: &str, bandwidth: f64, occupancy: f64, latency: f64) -> CenterId {
        self.add_communication(name, CenterKind::Switch, bandwidth, occupancy, latency)
    }

    /// Adds a master without slaves.
    pub fn add_master(
        &mut self,
        name: &str,
        power: f64,
        policy: PolicyKind,
        update_interval: Option<f64>,
    ) -> CenterId {
        self.add(
            name,
            CenterKind::Master,
            CenterParams::Master {
                power,
                policy,
                update_interval,
                slaves: Vec::new(),
            },
        )
    }

    /// Makes `machine` a slave of `master`. Ignored if `master` is not a master.
    pub fn add_slave(&mut self, master: CenterId, machine: CenterId) {
        if let Some(CenterParams::Master { slaves, .. }) = self.centers.get_mut(master.0).map(|c| &mut c.params) {
            if !slaves.contains(&machine) {
                slaves.push(machine);
            }
        }
    }

    /// Adds a directed connection.
    pub fn connect(&mut self, from: CenterId, to: CenterId) {
        self.connections.push((from, to));
    }

    /// Adds connections in both directions.
    pub fn connect_both(&mut self, a: CenterId, b: CenterId) {
        self.connect(a, b);
        self.connect(b, a);
    }

    /// Validates the collected centers and connections.
    pub fn build(self) -> Result<Topology, ConfigError> {
        let mut names = HashMap::new();
        for (idx, center) in self.centers.iter().enumerate() {
            if names.insert(center.name.clone(), CenterId(idx)).is_some() {
                return Err(ConfigError::DuplicateCenter(center.name.clone()));
            }
            validate_params(&self.centers, center)?;
        }

        let count = self.centers.len();
        let mut outbound = vec![Vec::new(); count];
        let mut inbound = vec![Vec::new(); count];
        let mut seen = HashSet::new();
        for (from, to) in self.connections {
            if from.0 >= count {
                return Err(ConfigError::UnknownCenter(from.to_string()));
            }
            if to.0 >= count {
                return Err(ConfigError::UnknownCenter(to.to_string()));
            }
            // duplicate connections would only add equivalent paths
            if from != to && seen.insert((from, to)) {
                outbound[from.0].push(to);
                inbound[to.0].push(from);
            }
        }

        Ok(Topology {
            centers: self.centers,
            outbound,
            inbound,
            names,
        })
    }
}

fn validate_params(centers: &[CenterSpec], center: &CenterSpec) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidParameter {
        center: center.name.clone(),
        reason: reason.to_owned(),
    };
    let check_occupancy = |occupancy: f64| {
        if (0.0..1.0).contains(&occupancy) {
            Ok(())
        } else {
            Err(invalid("occupancy must be in [0, 1)"))
        }
    };

    match &center.params {
        CenterParams::Machine {
            power,
            cores,
            occupancy,
        } => {
            if *power <= 0. {
                return Err(invalid("power must be positive"));
            }
            if *cores == 0 {
                return Err(invalid("machine needs at least one core"));
            }
            check_occupancy(*occupancy)
        }
        CenterParams::Communication {
            bandwidth,
            occupancy,
            latency,
        } => {
            if *bandwidth <= 0. {
                return Err(invalid("bandwidth must be positive"));
            }
            if *latency < 0. {
                return Err(invalid("latency must not be negative"));
            }
            check_occupancy(*occupancy)
        }
        CenterParams::Master {
            power,
            update_interval,
            slaves,
            ..
        } => {
            if *power <= 0. {
                return Err(invalid("power must be positive"));
            }
            if let Some(interval) = update_interval {
                if *interval <= 0. {
                    return Err(invalid("update interval must be positive"));
                }
            }
            for slave in slaves {
                match centers.get(slave.0) {
                    Some(spec) if spec.kind == CenterKind::Machine => {}
                    Some(spec) => {
                        return Err(ConfigError::NotAMachine {
                            master: center.name.clone(),
                            slave: spec.name.clone(),
                        })
                    }
                    None => return Err(ConfigError::UnknownCenter(slave.to_string())),
                }
            }
            Ok(())
        }
    }
}

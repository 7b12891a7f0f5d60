//! Queueing-network topology and routing.

pub mod graph;
pub mod router;

pub use graph::{CenterId, CenterKind, CenterParams, CenterSpec, Topology, TopologyBuilder};
pub use router::{compute_paths, RoutingMetric, RoutingTable};

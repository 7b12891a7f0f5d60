//! Precomputation of paths between masters and their slaves.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

use super::graph::{CenterId, CenterParams, Topology};

/// Cost model of a hop used by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMetric {
    /// Every hop costs the same.
    #[default]
    Hops,
    /// A hop costs the latency of the communication center it enters.
    Latency,
}

type Key = (OrderedFloat<f64>, usize);

/// Computes shortest paths from `source` to every center of `targets`.
///
/// A path lists the hops to traverse after leaving `source`, ending with the target itself. Only links, internet hubs
/// and switches are used as intermediate hops. Ties are broken by hop count and then by connection order, so the result
/// is stable for an unchanged topology.
pub fn compute_paths(
    topology: &Topology,
    source: CenterId,
    targets: &[CenterId],
    metric: RoutingMetric,
) -> Result<HashMap<CenterId, Vec<CenterId>>, ConfigError> {
    let count = topology.len();
    let mut best: Vec<Option<Key>> = vec![None; count];
    let mut prev: Vec<Option<CenterId>> = vec![None; count];
    let mut heap = BinaryHeap::new();
    let mut seq = 0usize;

    best[source.0] = Some((OrderedFloat(0.), 0));
    heap.push(Reverse((OrderedFloat(0.), 0usize, seq, source)));

    while let Some(Reverse((cost, hops, _, node))) = heap.pop() {
        if best[node.0] != Some((cost, hops)) {
            continue;
        }
        // end points are never relayed through
        if node != source && !topology.kind(node).is_communication() {
            continue;
        }
        for &next in topology.outbound(node) {
            let key = (OrderedFloat(cost.0 + hop_cost(topology, next, metric)), hops + 1);
            if best[next.0].map_or(true, |current| key < current) {
                best[next.0] = Some(key);
                prev[next.0] = Some(node);
                seq += 1;
                heap.push(Reverse((key.0, key.1, seq, next)));
            }
        }
    }

    let mut paths = HashMap::with_capacity(targets.len());
    for &target in targets {
        if target == source || best[target.0].is_none() {
            return Err(ConfigError::NoRoute {
                from: topology.name(source).to_owned(),
                to: topology.name(target).to_owned(),
            });
        }
        let mut path = vec![target];
        let mut current = target;
        while let Some(p) = prev[current.0] {
            if p == source {
                break;
            }
            path.push(p);
            current = p;
        }
        path.reverse();
        paths.insert(target, path);
    }
    Ok(paths)
}

fn hop_cost(topology: &Topology, node: CenterId, metric: RoutingMetric) -> f64 {
    match metric {
        RoutingMetric::Hops => 1.,
        RoutingMetric::Latency => match topology.center(node).params {
            CenterParams::Communication { latency, .. } => latency,
            _ => 0.,
        },
    }
}

/// Paths from every master to its slaves and from every slave back to its masters.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<(CenterId, CenterId), Vec<CenterId>>,
}

impl RoutingTable {
    /// Computes all routes of the topology.
    ///
    /// Every source is processed as an independent job on the current rayon pool. The call returns only after all jobs
    /// have finished.
    pub fn build(topology: &Topology, metric: RoutingMetric) -> Result<Self, ConfigError> {
        let mut jobs: Vec<(CenterId, Vec<CenterId>)> = Vec::new();
        for master in topology.masters() {
            jobs.push((master, topology.slaves(master).to_vec()));
        }
        for machine in topology.machines() {
            let masters = topology.masters_of(machine);
            if !masters.is_empty() {
                jobs.push((machine, masters));
            }
        }

        let computed = jobs
            .par_iter()
            .map(|(source, targets)| {
                compute_paths(topology, *source, targets, metric)
                    .map(|paths| paths.into_iter().map(|(target, path)| ((*source, target), path)).collect::<Vec<_>>())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let routes = computed.into_iter().flatten().collect();
        Ok(Self { routes })
    }

    /// Returns the route between two centers.
    pub fn route(&self, from: CenterId, to: CenterId) -> Option<&[CenterId]> {
        self.routes.get(&(from, to)).map(|path| path.as_slice())
    }

    /// Returns the number of stored routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if there are no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

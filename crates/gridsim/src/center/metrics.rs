use serde::Serialize;

/// Cumulative counters of a service center.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    /// Transmitted Mbit for communication centers, processed Mflop for machines.
    pub units: f64,
    /// Time spent serving clients.
    pub busy_seconds: f64,
    /// Completed services.
    pub services: u64,
    /// Services retracted before completion.
    pub cancelled: u64,
}

impl Metrics {
    pub(crate) fn record_service(&mut self, units: f64, duration: f64) {
        self.units += units;
        self.busy_seconds += duration;
        self.services += 1;
    }
}

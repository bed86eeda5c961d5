//! # Module: telemetry
//!
//! ## Responsibility
//! The per-flow counter contract consumed from the simulation
//! ([`TelemetrySource`]) and the reduction of those counters into the
//! aggregate statistics the reward is built from ([`aggregator`]).
//!
//! ## NOT Responsible For
//! - Generating traffic or classifying packets into flows (the simulation does that)
//! - Turning statistics into a reward (see [`crate::reward`])

pub mod aggregator;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use aggregator::{AggregateStats, FlowStatsAggregator, RunSummary, StatsWindow, ThroughputWindow};

/// Identifier of one traffic flow, assigned by the telemetry source.
pub type FlowId = u32;

/// Counters for one flow since the start of the simulation.
///
/// Owned and mutated by the telemetry source; the bridge only ever reads
/// copies of it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    /// Sum of end-to-end delays of every received packet.
    pub delay_sum: Duration,
    /// Packets declared lost by the last reconciliation pass.
    pub lost_packets: u64,
}

impl FlowRecord {
    /// Counter growth since `earlier`. Counters that went backwards clamp
    /// to zero.
    pub fn delta_since(&self, earlier: &FlowRecord) -> FlowRecord {
        FlowRecord {
            tx_packets: self.tx_packets.saturating_sub(earlier.tx_packets),
            rx_packets: self.rx_packets.saturating_sub(earlier.rx_packets),
            tx_bytes: self.tx_bytes.saturating_sub(earlier.tx_bytes),
            rx_bytes: self.rx_bytes.saturating_sub(earlier.rx_bytes),
            delay_sum: self.delay_sum.saturating_sub(earlier.delay_sum),
            lost_packets: self.lost_packets.saturating_sub(earlier.lost_packets),
        }
    }
}

/// Per-flow counters exposed by the simulation.
pub trait TelemetrySource {
    /// Reconcile packets that will never arrive so they are counted as lost
    /// before the counters are read.
    fn check_for_lost_packets(&mut self);

    /// Snapshot of every flow observed so far.
    fn flow_stats(&self) -> BTreeMap<FlowId, FlowRecord>;
}

/// Telemetry handle injected into the aggregator. Single-threaded: the
/// simulation and the bridge run on the same logical thread.
pub type SharedTelemetry = Rc<RefCell<dyn TelemetrySource>>;

/// A fixed set of flow records, for tests and replay.
#[derive(Debug, Clone, Default)]
pub struct StaticTelemetry {
    pub flows: BTreeMap<FlowId, FlowRecord>,
    /// Number of reconciliation passes requested so far.
    pub lost_packet_checks: u64,
}

impl StaticTelemetry {
    pub fn new(flows: impl IntoIterator<Item = FlowRecord>) -> Self {
        Self {
            flows: flows
                .into_iter()
                .enumerate()
                .map(|(i, r)| (i as FlowId + 1, r))
                .collect(),
            lost_packet_checks: 0,
        }
    }

    pub fn shared(self) -> Rc<RefCell<StaticTelemetry>> {
        Rc::new(RefCell::new(self))
    }
}

impl TelemetrySource for StaticTelemetry {
    fn check_for_lost_packets(&mut self) {
        self.lost_packet_checks += 1;
    }

    fn flow_stats(&self) -> BTreeMap<FlowId, FlowRecord> {
        self.flows.clone()
    }
}

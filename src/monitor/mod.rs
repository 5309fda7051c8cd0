//! Boundary to the network simulator's flow monitor.
//!
//! The simulator owns the cumulative per-flow counters and a classifier that
//! maps its internal flow ids to five-tuples. `acquire` polls both once and
//! produces the keyed snapshot map for the current instant.
//!
//! ## Implementations
//!
//! - `TraceMonitor` replays a JSON-lines trace exported from a simulation run
//! - `StaticMonitor` is an in-memory monitor for tests and embedding

pub mod trace;

use std::collections::BTreeMap;
use std::net::IpAddr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::flow::{FlowKey, FlowSnapshot};
use crate::utils::SimTime;

pub use trace::{TraceError, TraceMonitor};

/// Simulator-assigned flow identifier
pub type FlowId = u32;

/// Five-tuple as reported by the simulator's classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiveTuple {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
}

impl From<FiveTuple> for FlowKey {
    fn from(t: FiveTuple) -> Self {
        FlowKey::new(t.src, t.dst, t.src_port, t.dst_port, t.protocol)
    }
}

/// Lifetime counters for one flow id
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowStats {
    #[serde(default)]
    pub tx_packets: u64,
    #[serde(default)]
    pub rx_packets: u64,
    #[serde(default)]
    pub tx_bytes: u64,
    #[serde(default)]
    pub rx_bytes: u64,
    #[serde(default)]
    pub lost_packets: u64,
    /// Seconds
    #[serde(default)]
    pub delay_sum: f64,
    /// Seconds
    #[serde(default)]
    pub jitter_sum: f64,
}

impl From<FlowStats> for FlowSnapshot {
    fn from(s: FlowStats) -> Self {
        FlowSnapshot {
            tx_packets: s.tx_packets,
            rx_packets: s.rx_packets,
            tx_bytes: s.tx_bytes,
            rx_bytes: s.rx_bytes,
            lost_packets: s.lost_packets,
            delay_sum: s.delay_sum,
            jitter_sum: s.jitter_sum,
        }
    }
}

/// Maps simulator flow ids to five-tuples
pub trait FlowClassifier {
    fn find_flow(&self, id: FlowId) -> Option<FiveTuple>;
}

/// Source of cumulative per-flow counters
pub trait FlowMonitor {
    /// Current lifetime counters of every flow the monitor still knows about
    fn flow_stats(&self) -> BTreeMap<FlowId, FlowStats>;

    /// Move the monitor's notion of "now" to `time`. Live simulators ignore this.
    fn advance_to(&mut self, _time: SimTime) {}

    /// Last instant this monitor can report on, if it is finite
    fn horizon(&self) -> Option<SimTime> {
        None
    }
}

/// Poll `monitor` once and key its counters by five-tuple.
///
/// Ids the classifier cannot map are skipped. Flows the monitor no longer
/// reports are simply absent from the result.
pub fn acquire<M, C>(monitor: &M, classifier: &C) -> BTreeMap<FlowKey, FlowSnapshot>
where
    M: FlowMonitor + ?Sized,
    C: FlowClassifier + ?Sized,
{
    let mut current = BTreeMap::new();

    for (id, stats) in monitor.flow_stats() {
        let Some(tuple) = classifier.find_flow(id) else {
            warn!("Flow id {} has no classifier entry, skipping", id);
            continue;
        };

        let key = FlowKey::from(tuple);
        if current.insert(key, FlowSnapshot::from(stats)).is_some() {
            debug!("Flow id {} maps to already seen key {}, keeping the later id", id, key);
        }
    }

    current
}

/// In-memory monitor whose counters are set directly
#[derive(Debug, Default, Clone)]
pub struct StaticMonitor {
    flows: BTreeMap<FlowId, FiveTuple>,
    stats: BTreeMap<FlowId, FlowStats>,
}

impl StaticMonitor {
    pub fn new() -> Self {
        StaticMonitor::default()
    }

    /// Register a flow and its current counters
    pub fn insert(&mut self, id: FlowId, tuple: FiveTuple, stats: FlowStats) {
        self.flows.insert(id, tuple);
        self.stats.insert(id, stats);
    }

    /// Replace the counters of a known flow
    pub fn set_stats(&mut self, id: FlowId, stats: FlowStats) {
        self.stats.insert(id, stats);
    }

    /// Drop a flow's counters, as a monitor evicting an idle flow would
    pub fn forget(&mut self, id: FlowId) {
        self.stats.remove(&id);
    }
}

impl FlowClassifier for StaticMonitor {
    fn find_flow(&self, id: FlowId) -> Option<FiveTuple> {
        self.flows.get(&id).copied()
    }
}

impl FlowMonitor for StaticMonitor {
    fn flow_stats(&self) -> BTreeMap<FlowId, FlowStats> {
        self.stats.clone()
    }
}

//! Window-tick engine.
//!
//! The engine owns the previous-window registry, the dataset sink and the
//! window clock. Each `tick` consumes the snapshot map observed at the end of
//! the current window, writes one row per emitted flow, swaps the snapshot in
//! as the new baseline, advances the window and reports when the next tick is
//! due. Scheduling is left to the caller.

use std::collections::BTreeMap;

use color_eyre::Result;
use log::{debug, warn};

use crate::config::Config;
use crate::features::FlowFeatures;
use crate::flow::{resolve, DeltaPolicy, FlowKey, FlowRegistry, FlowSnapshot, ResolvedFlow};
use crate::labeler::{Labeler, Labels};
use crate::monitor::{acquire, FlowClassifier, FlowMonitor};
use crate::scenario::Roles;
use crate::sink::{CsvSink, Durable, FlowRecord};
use crate::utils::{duration_to_sim_time, nanos_to_sim_time, sim_time_to_nanos, SimTime};

/// Half-open interval `[start, start + size)`, the `index`-th of the run.
///
/// Boundaries are `index * size` on a nanosecond grid rather than a running
/// sum, so they stay exact multiples of the window size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    index: u64,
    size: f64,
}

impl Window {
    pub fn nth(index: u64, size: f64) -> Self {
        Window { index, size }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn start(&self) -> SimTime {
        self.boundary(self.index)
    }

    pub fn end(&self) -> SimTime {
        self.boundary(self.index + 1)
    }

    pub fn contains(&self, t: SimTime) -> bool {
        t >= self.start() && t < self.end()
    }

    /// The window immediately after this one
    pub fn next(&self) -> Window {
        Window::nth(self.index + 1, self.size)
    }

    fn boundary(&self, n: u64) -> SimTime {
        nanos_to_sim_time(n.saturating_mul(sim_time_to_nanos(self.size)))
    }
}

/// Per-run constants copied into every row
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub scenario_id: String,
    pub ue_total: u32,
}

/// Outcome of one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// The window the rows describe
    pub window: Window,
    pub flows_observed: usize,
    pub rows: usize,
    pub attack_rows: usize,
    pub new_flows: usize,
    /// Rows where a counter went backwards, whether or not it was clamped
    pub regressions: usize,
    pub lost_packets: i64,
    /// Time at which the driver should fire the next tick
    pub next_tick_at: SimTime,
}

pub struct Engine<W: Durable> {
    registry: FlowRegistry,
    sink: CsvSink<W>,
    window: Window,
    labeler: Labeler,
    policy: DeltaPolicy,
    context: RunContext,
    ticks: u64,
}

impl<W: Durable> Engine<W> {
    pub fn new(
        sink: CsvSink<W>,
        window_size: f64,
        labeler: Labeler,
        policy: DeltaPolicy,
        context: RunContext,
    ) -> Self {
        Engine {
            registry: FlowRegistry::new(),
            sink,
            window: Window::nth(0, window_size),
            labeler,
            policy,
            context,
            ticks: 0,
        }
    }

    /// Build an engine for a validated configuration and its roles
    pub fn from_config(config: &Config, roles: &Roles, sink: CsvSink<W>) -> Self {
        let labeler = Labeler::new(
            config.labeling.rate_threshold,
            config.labeling.node_id,
            roles.attackers().clone(),
            config.traffic.attack_interval,
        );

        let context = RunContext {
            scenario_id: config.general.scenario_tag.clone(),
            ue_total: config.general.ue_total,
        };

        Engine::new(
            sink,
            config.general.window_size,
            labeler,
            config.delta_policy(),
            context,
        )
    }

    /// Window the next tick will report on
    pub fn window(&self) -> Window {
        self.window
    }

    /// When the next tick is due: the end of the current window
    pub fn next_tick_at(&self) -> SimTime {
        self.window.end()
    }

    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn rows_written(&self) -> u64 {
        self.sink.rows_written()
    }

    /// Poll a monitor and tick with what it reports
    pub fn sample<M>(&mut self, monitor: &M) -> Result<TickReport>
    where
        M: FlowMonitor + FlowClassifier + ?Sized,
    {
        let current = acquire(monitor, monitor);
        self.tick(current)
    }

    /// Close the current window with the snapshots observed at its end
    pub fn tick(&mut self, current: BTreeMap<FlowKey, FlowSnapshot>) -> Result<TickReport> {
        let window = self.window;
        let resolved = resolve(&current, &self.registry, self.policy);

        let mut attack_rows = 0;
        let mut regressions = 0;
        let mut lost_packets: i64 = 0;

        for flow in &resolved {
            let features = FlowFeatures::compute(flow, window.size());
            let labels = self.labeler.label(&flow.key, &features);

            if flow.has_regression() {
                warn!(
                    "Counters went backwards for {} in window [{}, {})",
                    flow.key,
                    window.start(),
                    window.end()
                );
                regressions += 1;
            }
            if labels.binary {
                attack_rows += 1;
            }
            lost_packets = lost_packets.saturating_add(features.lost_packets);

            let record = self.record(&window, flow, &features, &labels);
            self.sink.write(&record)?;
        }

        self.sink.finish_window()?;

        let report = TickReport {
            window,
            flows_observed: current.len(),
            rows: resolved.len(),
            attack_rows,
            new_flows: resolved.iter().filter(|f| f.is_new).count(),
            regressions,
            lost_packets,
            next_tick_at: window.next().end(),
        };

        self.registry.replace(current);
        self.window = window.next();
        self.ticks += 1;

        debug!(
            "Window [{}, {}): {} flows observed, {} rows, {} attack",
            window.start(),
            window.end(),
            report.flows_observed,
            report.rows,
            report.attack_rows
        );

        Ok(report)
    }

    fn record(
        &self,
        window: &Window,
        flow: &ResolvedFlow,
        features: &FlowFeatures,
        labels: &Labels,
    ) -> FlowRecord {
        FlowRecord {
            time_start: window.start(),
            time_end: window.end(),
            scenario_id: self.context.scenario_id.clone(),
            ue_total: self.context.ue_total,
            attackers: self.labeler.attacker_count(),
            src_ip: flow.key.src.to_string(),
            dst_ip: flow.key.dst.to_string(),
            src_port: flow.key.src_port,
            dst_port: flow.key.dst_port,
            protocol: flow.key.protocol,
            packet_size: features.packet_size,
            flow_duration: window.size(),
            total_bytes_fwd: features.total_bytes_fwd,
            total_bytes_bwd: features.total_bytes_bwd,
            total_pkts_fwd: features.total_pkts_fwd,
            total_pkts_bwd: features.total_pkts_bwd,
            pkts_per_sec: features.pkts_per_sec,
            bytes_per_sec: features.bytes_per_sec,
            flow_pkts_per_sec: features.flow_pkts_per_sec,
            flow_bytes_per_sec: features.flow_bytes_per_sec,
            jitter_ms: features.jitter_ms,
            delay_ms: features.delay_ms,
            label_binary: u8::from(labels.binary),
            label_intensity: labels.intensity.as_u8(),
        }
    }

    /// Finish the run and hand back the sink's writer
    pub fn into_inner(self) -> Result<W> {
        self.sink.into_inner()
    }
}

/// Stop time of a configuration in simulation seconds, if set
pub fn configured_stop_time(config: &Config) -> Option<SimTime> {
    config.general.stop_time.map(duration_to_sim_time)
}

//! Periodic tick scheduling and the run summary.
//!
//! Ticks fire at `W, 2W, 3W, ...`. With an explicit stop time, a tick only
//! fires while its time is strictly before the stop: a simulator stops before
//! it runs events scheduled at the stop instant. Without one, ticks continue
//! up to and including the monitor's last reportable instant.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use color_eyre::eyre::{eyre, Context};
use color_eyre::Result;
use log::info;
use serde::Serialize;

use crate::engine::Engine;
use crate::monitor::{FlowClassifier, FlowMonitor};
use crate::sink::Durable;
use crate::utils::{at_or_before, SimTime};

/// Totals for one run, written next to the dataset
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub scenario_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub window_size: f64,
    /// Time of the last tick
    pub end_time: SimTime,
    pub windows: u64,
    pub rows: u64,
    pub attack_rows: u64,
    pub new_flows: u64,
    pub regressions: u64,
    pub lost_packets: i64,
    pub attackers: Vec<u32>,
    pub servers: Vec<u32>,
    pub clients: usize,
    pub benign_clients: usize,
}

impl RunSummary {
    /// Write the summary as pretty-printed JSON
    pub fn write_json(&self, output_path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize run summary")?;

        fs::write(output_path, json)
            .with_context(|| format!("Failed to write run summary to {}", output_path.display()))?;

        info!("Run summary written to {}", output_path.display());
        Ok(())
    }
}

/// Decide whether a tick scheduled at `t` still fires
fn tick_due(t: SimTime, stop_time: Option<SimTime>, horizon: Option<SimTime>) -> bool {
    match (stop_time, horizon) {
        (Some(stop), _) => !at_or_before(stop, t),
        (None, Some(end)) => at_or_before(t, end),
        (None, None) => false,
    }
}

/// Drive `engine` off `monitor` until the stop time or the monitor's horizon.
///
/// The returned summary leaves `dataset` and the role fields empty for the
/// caller to fill in.
pub fn run<W, M>(
    engine: &mut Engine<W>,
    monitor: &mut M,
    stop_time: Option<SimTime>,
    scenario_id: &str,
) -> Result<RunSummary>
where
    W: Durable,
    M: FlowMonitor + FlowClassifier + ?Sized,
{
    let horizon = monitor.horizon();
    if stop_time.is_none() && horizon.is_none() {
        return Err(eyre!(
            "No stop time configured and the flow monitor has no end; refusing to run forever"
        ));
    }

    let started_at = Utc::now();
    let window_size = engine.window().size();
    let mut summary = RunSummary {
        scenario_id: scenario_id.to_string(),
        dataset: None,
        started_at,
        finished_at: started_at,
        window_size,
        end_time: 0.0,
        windows: 0,
        rows: 0,
        attack_rows: 0,
        new_flows: 0,
        regressions: 0,
        lost_packets: 0,
        attackers: Vec::new(),
        servers: Vec::new(),
        clients: 0,
        benign_clients: 0,
    };

    match stop_time {
        Some(stop) => info!("Ticking every {}s until t={}s", window_size, stop),
        None => info!(
            "Ticking every {}s until the end of the trace at t={}s",
            window_size,
            horizon.unwrap_or_default()
        ),
    }

    let mut next = engine.next_tick_at();
    while tick_due(next, stop_time, horizon) {
        monitor.advance_to(next);
        let report = engine
            .sample(&*monitor)
            .with_context(|| format!("Tick at t={} failed", next))?;

        summary.windows += 1;
        summary.rows += report.rows as u64;
        summary.attack_rows += report.attack_rows as u64;
        summary.new_flows += report.new_flows as u64;
        summary.regressions += report.regressions as u64;
        summary.lost_packets = summary.lost_packets.saturating_add(report.lost_packets);
        summary.end_time = next;

        next = report.next_tick_at;
    }

    summary.finished_at = Utc::now();
    info!(
        "Finished after {} windows: {} rows, {} labelled attack",
        summary.windows, summary.rows, summary.attack_rows
    );

    Ok(summary)
}

//! JSON-lines flow monitor trace replay.
//!
//! A trace is the flow monitor of a finished simulation, exported one JSON
//! object per line:
//!
//! ```text
//! {"flow": {"id": 3, "src": "10.1.1.4", "dst": "10.1.1.2", "src_port": 49153, "dst_port": 1001, "protocol": 17}}
//! {"sample": {"time": 1.0, "stats": [{"id": 3, "tx_packets": 50, "rx_packets": 50, "tx_bytes": 25600, "rx_bytes": 25600}]}}
//! ```
//!
//! `flow` lines populate the classifier. Each `sample` line is one poll of the
//! monitor at virtual time `time`; sample times must strictly increase. Blank
//! lines and lines starting with `#` are ignored.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Deserialize;

use super::{FiveTuple, FlowClassifier, FlowId, FlowMonitor, FlowStats};
use crate::utils::{at_or_before, SimTime};

/// Errors raised while loading a trace
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("Failed to read trace {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid trace entry on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Sample on line {line} at t={time} does not follow previous sample at t={previous}")]
    OutOfOrder {
        line: usize,
        time: SimTime,
        previous: SimTime,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TraceLine {
    Flow(FlowEntry),
    Sample(SampleEntry),
}

#[derive(Debug, Deserialize)]
struct FlowEntry {
    id: FlowId,
    src: std::net::IpAddr,
    dst: std::net::IpAddr,
    src_port: u16,
    dst_port: u16,
    protocol: u8,
}

#[derive(Debug, Deserialize)]
struct SampleEntry {
    time: SimTime,
    #[serde(default)]
    stats: Vec<StatsEntry>,
}

#[derive(Debug, Deserialize)]
struct StatsEntry {
    id: FlowId,
    #[serde(default)]
    tx_packets: u64,
    #[serde(default)]
    rx_packets: u64,
    #[serde(default)]
    tx_bytes: u64,
    #[serde(default)]
    rx_bytes: u64,
    #[serde(default)]
    lost_packets: u64,
    #[serde(default)]
    delay_sum: f64,
    #[serde(default)]
    jitter_sum: f64,
}

impl StatsEntry {
    fn stats(&self) -> FlowStats {
        FlowStats {
            tx_packets: self.tx_packets,
            rx_packets: self.rx_packets,
            tx_bytes: self.tx_bytes,
            rx_bytes: self.rx_bytes,
            lost_packets: self.lost_packets,
            delay_sum: self.delay_sum,
            jitter_sum: self.jitter_sum,
        }
    }
}

#[derive(Debug, Clone)]
struct Sample {
    time: SimTime,
    stats: BTreeMap<FlowId, FlowStats>,
}

/// Monitor that replays a recorded trace.
///
/// Before the first `advance_to` (or before the first sample time) the
/// monitor reports no flows.
#[derive(Debug, Clone, Default)]
pub struct TraceMonitor {
    classifier: BTreeMap<FlowId, FiveTuple>,
    samples: Vec<Sample>,
    cursor: Option<usize>,
}

impl TraceMonitor {
    /// Load a trace file
    pub fn open(path: &Path) -> Result<Self, TraceError> {
        let file = File::open(path).map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let monitor = Self::from_reader(BufReader::new(file)).map_err(|e| match e {
            TraceError::Io { source, .. } => TraceError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;

        info!(
            "Loaded trace {}: {} flows, {} samples",
            path.display(),
            monitor.flow_count(),
            monitor.sample_count()
        );
        Ok(monitor)
    }

    /// Parse a trace from any buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, TraceError> {
        let mut monitor = TraceMonitor::default();

        for (index, line) in reader.lines().enumerate() {
            let line_no = index + 1;
            let line = line.map_err(|source| TraceError::Io {
                path: PathBuf::new(),
                source,
            })?;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let entry: TraceLine = serde_json::from_str(trimmed).map_err(|source| TraceError::Parse {
                line: line_no,
                source,
            })?;

            match entry {
                TraceLine::Flow(flow) => {
                    let tuple = FiveTuple {
                        src: flow.src,
                        dst: flow.dst,
                        src_port: flow.src_port,
                        dst_port: flow.dst_port,
                        protocol: flow.protocol,
                    };
                    if monitor.classifier.insert(flow.id, tuple).is_some() {
                        warn!("Trace line {} redefines flow id {}", line_no, flow.id);
                    }
                }
                TraceLine::Sample(sample) => {
                    if let Some(last) = monitor.samples.last() {
                        if sample.time <= last.time {
                            return Err(TraceError::OutOfOrder {
                                line: line_no,
                                time: sample.time,
                                previous: last.time,
                            });
                        }
                    }

                    let stats = sample.stats.iter().map(|s| (s.id, s.stats())).collect();
                    monitor.samples.push(Sample {
                        time: sample.time,
                        stats,
                    });
                }
            }
        }

        Ok(monitor)
    }

    pub fn flow_count(&self) -> usize {
        self.classifier.len()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Time of the sample currently being reported
    pub fn current_time(&self) -> Option<SimTime> {
        self.cursor.map(|i| self.samples[i].time)
    }
}

impl FlowClassifier for TraceMonitor {
    fn find_flow(&self, id: FlowId) -> Option<FiveTuple> {
        self.classifier.get(&id).copied()
    }
}

impl FlowMonitor for TraceMonitor {
    fn flow_stats(&self) -> BTreeMap<FlowId, FlowStats> {
        self.cursor
            .map(|i| self.samples[i].stats.clone())
            .unwrap_or_default()
    }

    /// Report the latest sample taken at or before `time`
    fn advance_to(&mut self, time: SimTime) {
        let next = self.samples.partition_point(|s| at_or_before(s.time, time));
        self.cursor = next.checked_sub(1);

        match self.cursor {
            Some(i) if !at_or_before(time, self.samples[i].time) => debug!(
                "No trace sample at t={}, reporting sample from t={}",
                time, self.samples[i].time
            ),
            None => debug!("No trace sample at or before t={}", time),
            _ => {}
        }
    }

    fn horizon(&self) -> Option<SimTime> {
        self.samples.last().map(|s| s.time)
    }
}

//! CSV dataset sink.
//!
//! Writes the header once when the sink is created, then one record per
//! emitted flow. `finish_window` flushes buffered rows and syncs the file so a
//! completed window survives the process dying right after it.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use log::info;
use serde::Serialize;

/// Dataset columns, in output order
pub const COLUMNS: [&str; 24] = [
    "time_start",
    "time_end",
    "scenario_id",
    "ue_total",
    "attackers",
    "src_ip",
    "dst_ip",
    "src_port",
    "dst_port",
    "protocol",
    "packet_size",
    "flow_duration",
    "total_bytes_fwd",
    "total_bytes_bwd",
    "total_pkts_fwd",
    "total_pkts_bwd",
    "pkts_per_sec",
    "bytes_per_sec",
    "flow_pkts_per_sec",
    "flow_bytes_per_sec",
    "jitter_ms",
    "delay_ms",
    "label_binary",
    "label_intensity",
];

/// One dataset row. Field order must match `COLUMNS`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowRecord {
    pub time_start: f64,
    pub time_end: f64,
    pub scenario_id: String,
    pub ue_total: u32,
    pub attackers: usize,
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
    pub packet_size: f64,
    pub flow_duration: f64,
    pub total_bytes_fwd: i64,
    pub total_bytes_bwd: i64,
    pub total_pkts_fwd: i64,
    pub total_pkts_bwd: i64,
    pub pkts_per_sec: f64,
    pub bytes_per_sec: f64,
    pub flow_pkts_per_sec: f64,
    pub flow_bytes_per_sec: f64,
    pub jitter_ms: f64,
    pub delay_ms: f64,
    pub label_binary: u8,
    pub label_intensity: u8,
}

/// A write target that can push flushed data down to durable storage
pub trait Durable: Write {
    fn persist(&self) -> io::Result<()>;
}

impl Durable for File {
    fn persist(&self) -> io::Result<()> {
        self.sync_data()
    }
}

impl Durable for Vec<u8> {
    fn persist(&self) -> io::Result<()> {
        Ok(())
    }
}

pub struct CsvSink<W: Durable> {
    writer: csv::Writer<W>,
    rows: u64,
}

impl CsvSink<File> {
    /// Create (truncating) the dataset file at `path` and write the header
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("Failed to create dataset file '{}'", path.display()))?;

        info!("Writing dataset to {}", path.display());
        CsvSink::new(file)
    }
}

impl<W: Durable> CsvSink<W> {
    /// Wrap `inner` and write the header line
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        writer
            .write_record(COLUMNS)
            .wrap_err("Failed to write dataset header")?;

        let mut sink = CsvSink { writer, rows: 0 };
        // The header alone counts as a completed window for crash consistency
        sink.finish_window()?;
        Ok(sink)
    }

    pub fn write(&mut self, record: &FlowRecord) -> Result<()> {
        self.writer
            .serialize(record)
            .wrap_err("Failed to write dataset row")?;
        self.rows += 1;
        Ok(())
    }

    /// Flush buffered rows and sync them to storage
    pub fn finish_window(&mut self) -> Result<()> {
        self.writer.flush().wrap_err("Failed to flush dataset")?;
        self.writer
            .get_ref()
            .persist()
            .wrap_err("Failed to sync dataset to disk")?;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Flush and return the underlying writer
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| eyre!("Failed to flush dataset: {}", e.error()))
    }
}

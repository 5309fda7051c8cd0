//! # Flowset - Windowed flow-statistics datasets from network simulations
//!
//! This library turns the cumulative per-flow counters of a network
//! simulator's flow monitor into a labelled, per-window CSV dataset suitable
//! for training traffic classifiers.
//!
//! ## Overview
//!
//! At the end of every fixed-size window the engine polls the flow monitor,
//! differences each flow's counters against the previous window, pairs every
//! flow with its reverse direction, derives rate, size and latency features,
//! labels the row from the scenario's attacker set and a packet-rate
//! threshold, and appends it to the dataset. Each completed window is flushed
//! to disk before the next one starts.
//!
//! ## Architecture
//!
//! - `config`: Type-safe configuration structures and YAML parsing
//! - `config_loader`: Configuration file loading and CLI overrides
//! - `flow`: Flow keys, counter snapshots, the previous-window registry and
//!   the forward/reverse resolver
//! - `features`: Per-window feature derivation
//! - `labeler`: Binary and intensity ground-truth labels
//! - `sink`: CSV dataset output
//! - `monitor`: Flow monitor boundary and the JSON-lines trace replay
//! - `scenario`: Attacker and server role assignment
//! - `engine`: The window tick
//! - `driver`: Tick scheduling and the run summary
//! - `utils`: Virtual-time helpers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use flowset::{config_loader, driver, engine::Engine, monitor::TraceMonitor, sink::CsvSink};
//!
//! let config = config_loader::load_config(Path::new("scenario.yaml"))?;
//! let roles = config.roles();
//! let sink = CsvSink::create(&config.dataset_path())?;
//! let mut engine = Engine::from_config(&config, &roles, sink);
//!
//! let mut monitor = TraceMonitor::open(Path::new("flowmon.jsonl"))?;
//! let summary = driver::run(&mut engine, &mut monitor, None, &config.general.scenario_tag)?;
//! println!("{} rows written", summary.rows);
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! general:
//!   scenario_tag: "p2p"
//!   ue_total: 25
//!   window_size: 1.0
//!   stop_time: "20s"
//!
//! traffic:
//!   transport: udp
//!   enable_attack: true
//!   attack_interval: "200us"
//!
//! labeling:
//!   rate_threshold: 5000.0
//! ```
//!
//! ## Error Handling
//!
//! Module boundaries return typed errors (`ValidationError`, `TraceError`);
//! everything above them uses `color_eyre` for error reporting with context.

pub mod config;
pub mod config_loader;
pub mod driver;
pub mod engine;
pub mod features;
pub mod flow;
pub mod labeler;
pub mod monitor;
pub mod scenario;
pub mod sink;
pub mod utils;

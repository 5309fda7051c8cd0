use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use flowset::config::Config;
use flowset::config_loader::{self, CliOverrides};
use flowset::driver;
use flowset::engine::{configured_stop_time, Engine};
use flowset::monitor::TraceMonitor;
use flowset::sink::CsvSink;

/// Build a labelled per-window flow dataset from a flow monitor trace
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the scenario configuration YAML file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON-lines flow monitor trace to replay
    #[arg(short, long)]
    trace: PathBuf,

    /// Output directory for the dataset and run summary
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Scenario tag used in the dataset name and scenario_id column
    #[arg(long)]
    scenario_tag: Option<String>,

    /// Window size in simulation seconds
    #[arg(short, long)]
    window: Option<f64>,

    /// Stop ticking at this simulation time (e.g. "20s")
    #[arg(long, value_parser = parse_duration)]
    stop_time: Option<Duration>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_duration(s: &str) -> Result<Duration, humantime_serde::re::humantime::DurationError> {
    humantime_serde::re::humantime::parse_duration(s)
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            output_dir: self.output.clone(),
            scenario_tag: self.scenario_tag.clone(),
            window_size: self.window,
            stop_time: self.stop_time,
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    // Initialize logging; RUST_LOG takes precedence over --log-level
    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level.as_str())).init();

    info!("Starting flowset v{}", env!("CARGO_PKG_VERSION"));
    info!("Trace file: {:?}", args.trace);

    run(&args)
}

/// Build the dataset described by `args`
fn run(args: &Args) -> Result<()> {
    // Load configuration, then let the command line override it
    let mut config = match &args.config {
        Some(path) => config_loader::load_config(path)?,
        None => {
            info!("No configuration file given, using defaults");
            Config::default()
        }
    };
    config_loader::apply_overrides(&mut config, &args.overrides())?;

    let roles = config.roles();
    info!(
        "Scenario '{}': {} nodes, {} attackers, {} servers, {} benign clients",
        config.general.scenario_tag,
        roles.ue_total(),
        roles.attackers().len(),
        roles.servers().len(),
        roles.benign_clients()
    );

    // Load the trace before touching an existing dataset
    let mut monitor = TraceMonitor::open(&args.trace)?;

    // The dataset must be writable before any window is processed
    fs::create_dir_all(&config.output.dir).wrap_err_with(|| {
        format!(
            "Failed to create output directory '{}'",
            config.output.dir.display()
        )
    })?;
    let dataset_path = config.dataset_path();
    let sink = CsvSink::create(&dataset_path)?;
    let mut engine = Engine::from_config(&config, &roles, sink);

    let mut summary = driver::run(
        &mut engine,
        &mut monitor,
        configured_stop_time(&config),
        &config.general.scenario_tag,
    )?;
    engine.into_inner()?;

    summary.dataset = Some(dataset_path.clone());
    summary.attackers = roles.attackers().iter().copied().collect();
    summary.servers = roles.servers().iter().copied().collect();
    summary.clients = roles.clients();
    summary.benign_clients = roles.benign_clients();

    if config.output.summary {
        summary.write_json(&config.summary_path())?;
    }

    info!("Dataset written to {:?}", dataset_path);
    Ok(())
}

use crate::config::Config;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    // Open the configuration file
    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration '{}'", config_path.display()))?;

    // Parse the YAML content
    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration '{}'", config_path.display()))?;

    // Validate the configuration
    config.validate()?;

    Ok(config)
}

/// Command-line values that take precedence over the YAML settings
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub output_dir: Option<PathBuf>,
    pub scenario_tag: Option<String>,
    pub window_size: Option<f64>,
    pub stop_time: Option<Duration>,
}

/// Apply CLI overrides to a configuration and re-validate it
pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) -> Result<()> {
    if let Some(dir) = &overrides.output_dir {
        info!("Output directory overridden: {}", dir.display());
        config.output.dir = dir.clone();
    }

    if let Some(tag) = &overrides.scenario_tag {
        info!("Scenario tag overridden: {}", tag);
        config.general.scenario_tag = tag.clone();
    }

    if let Some(window) = overrides.window_size {
        info!("Window size overridden: {}", window);
        config.general.window_size = window;
    }

    if let Some(stop) = overrides.stop_time {
        info!("Stop time overridden: {:?}", stop);
        config.general.stop_time = Some(stop);
    }

    // Re-validate after applying overrides
    config.validate()?;

    Ok(())
}

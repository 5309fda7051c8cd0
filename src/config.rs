use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::flow::DeltaPolicy;
use crate::labeler::{NodeIdStrategy, DEFAULT_RATE_THRESHOLD};
use crate::scenario::Roles;
use crate::utils::sim_time_to_nanos;

/// Transport used by the scenario's applications
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Udp,
    Tcp,
}

impl Transport {
    /// Name used in dataset file names
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Udp => "udp",
            Transport::Tcp => "tcp",
        }
    }
}

/// Run configuration, loaded from YAML
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub traffic: TrafficConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<RolesConfig>,
    #[serde(default)]
    pub labeling: LabelingConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let general = &self.general;

        if !general.window_size.is_finite() || general.window_size <= 0.0 {
            return Err(ValidationError::InvalidGeneral(format!(
                "window_size must be a positive number, got {}",
                general.window_size
            )));
        }

        if sim_time_to_nanos(general.window_size) == 0 {
            return Err(ValidationError::InvalidGeneral(format!(
                "window_size must be at least one nanosecond, got {}",
                general.window_size
            )));
        }

        if general.ue_total == 0 {
            return Err(ValidationError::InvalidGeneral(
                "ue_total must be at least 1".to_string(),
            ));
        }

        if general.scenario_tag.is_empty() {
            return Err(ValidationError::InvalidGeneral(
                "scenario_tag cannot be empty".to_string(),
            ));
        }

        if general.scenario_tag.contains(['/', '\\']) {
            return Err(ValidationError::InvalidGeneral(format!(
                "scenario_tag '{}' must not contain path separators",
                general.scenario_tag
            )));
        }

        if let Some(stop) = general.stop_time {
            if stop.is_zero() {
                return Err(ValidationError::InvalidGeneral(
                    "stop_time must be greater than zero".to_string(),
                ));
            }
        }

        // Validate traffic settings
        if self.traffic.attack_interval.is_zero() {
            return Err(ValidationError::InvalidTraffic(
                "attack_interval must be greater than zero".to_string(),
            ));
        }
        if self.traffic.benign_interval.is_zero() {
            return Err(ValidationError::InvalidTraffic(
                "benign_interval must be greater than zero".to_string(),
            ));
        }

        // Validate labelling
        let threshold = self.labeling.rate_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ValidationError::InvalidLabeling(format!(
                "rate_threshold must be a positive number, got {}",
                threshold
            )));
        }

        // Validate explicit roles
        if let Some(roles) = &self.roles {
            for node in roles.attackers.iter().chain(roles.servers.iter()) {
                if *node >= general.ue_total {
                    return Err(ValidationError::InvalidRoles(format!(
                        "node id {} is out of range for ue_total {}",
                        node, general.ue_total
                    )));
                }
            }

            if !roles.attackers.is_empty() && !self.traffic.enable_attack {
                return Err(ValidationError::InvalidRoles(
                    "attackers are listed but enable_attack is false".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Dataset file name: `dataset_{tag}_ue{N}_{tcp|udp}_{ddos|benign}.csv`
    pub fn dataset_file_name(&self) -> String {
        format!(
            "dataset_{}_ue{}_{}_{}.csv",
            self.general.scenario_tag,
            self.general.ue_total,
            self.traffic.transport.as_str(),
            if self.traffic.enable_attack { "ddos" } else { "benign" }
        )
    }

    /// Full path of the dataset file
    pub fn dataset_path(&self) -> PathBuf {
        self.output.dir.join(self.dataset_file_name())
    }

    /// Path of the run summary written next to the dataset
    pub fn summary_path(&self) -> PathBuf {
        self.dataset_path().with_extension("summary.json")
    }

    pub fn delta_policy(&self) -> DeltaPolicy {
        DeltaPolicy {
            clamp_negative: self.policy.clamp_negative_deltas,
            emit_both_directions: self.policy.emit_both_directions,
        }
    }

    /// Explicit roles when configured, otherwise the derived scenario roles
    pub fn roles(&self) -> Roles {
        match &self.roles {
            Some(roles) => Roles::explicit(
                self.general.ue_total,
                roles.attackers.iter().copied().collect(),
                roles.servers.iter().copied().collect(),
            ),
            None => Roles::derive(
                self.general.ue_total,
                self.traffic.enable_attack,
                self.general.seed,
            ),
        }
    }
}

/// Run-wide settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default = "default_scenario_tag")]
    pub scenario_tag: String,
    #[serde(default = "default_ue_total")]
    pub ue_total: u32,
    /// Window size in simulation seconds
    #[serde(default = "default_window_size")]
    pub window_size: f64,
    /// Stop ticking at this simulation time; defaults to the end of the trace
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<Duration>,
    /// Seed for derived role assignment
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// Application traffic settings of the simulated scenario
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TrafficConfig {
    #[serde(default)]
    pub transport: Transport,
    #[serde(default = "default_true")]
    pub enable_attack: bool,
    #[serde(default = "default_attack_interval", with = "humantime_serde")]
    pub attack_interval: Duration,
    #[serde(default = "default_benign_interval", with = "humantime_serde")]
    pub benign_interval: Duration,
}

/// Explicit role assignment
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct RolesConfig {
    #[serde(default)]
    pub attackers: Vec<u32>,
    #[serde(default)]
    pub servers: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LabelingConfig {
    #[serde(default = "default_rate_threshold")]
    pub rate_threshold: f64,
    #[serde(default)]
    pub node_id: NodeIdStrategy,
}

/// Treatment of counter regressions and reverse pairs
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    #[serde(default)]
    pub clamp_negative_deltas: bool,
    #[serde(default)]
    pub emit_both_directions: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// Write a JSON run summary next to the dataset
    #[serde(default = "default_true")]
    pub summary: bool,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid traffic configuration: {0}")]
    InvalidTraffic(String),
    #[error("Invalid roles configuration: {0}")]
    InvalidRoles(String),
    #[error("Invalid labeling configuration: {0}")]
    InvalidLabeling(String),
}

fn default_scenario_tag() -> String {
    "default".to_string()
}

fn default_ue_total() -> u32 {
    25
}

fn default_window_size() -> f64 {
    1.0
}

fn default_seed() -> u64 {
    1
}

fn default_true() -> bool {
    true
}

fn default_attack_interval() -> Duration {
    Duration::from_micros(200)
}

fn default_benign_interval() -> Duration {
    Duration::from_millis(20)
}

fn default_rate_threshold() -> f64 {
    DEFAULT_RATE_THRESHOLD
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("datasets")
}

/// Default implementations
impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            scenario_tag: default_scenario_tag(),
            ue_total: default_ue_total(),
            window_size: default_window_size(),
            stop_time: None,
            seed: default_seed(),
        }
    }
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            enable_attack: true,
            attack_interval: default_attack_interval(),
            benign_interval: default_benign_interval(),
        }
    }
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            rate_threshold: default_rate_threshold(),
            node_id: NodeIdStrategy::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            summary: true,
        }
    }
}

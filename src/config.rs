//! Run configuration.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. CLI flags are overlaid on top afterwards (see
//! [`crate::cli::Args::overlay`]).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::reward::DEFAULT_PDR_THRESHOLD;
use crate::routing::{ObservationReduce, OutOfBoundsPolicy};
use crate::sim::SimTime;
use crate::telemetry::{StatsWindow, ThroughputWindow};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub simulation: SimulationConfig,
    pub bridge: TransportConfig,
    pub reward: RewardConfig,
    pub stats: StatsConfig,
    pub observation: ObservationConfig,
    pub action: ActionConfig,
    pub scenario: ScenarioConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub seed: u64,
    pub duration_secs: f64,
    pub step_interval_secs: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 8,
            duration_secs: 30.0,
            step_interval_secs: 0.1,
        }
    }
}

/// Where the simulation listens for its agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5555,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewardConfig {
    /// Delivery ratio (percent) below which the reward is zero.
    pub pdr_threshold: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            pdr_threshold: DEFAULT_PDR_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatsConfig {
    pub window: StatsWindow,
    pub throughput_window: ThroughputWindow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObservationConfig {
    pub reduce: ObservationReduce,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActionConfig {
    /// Node whose OLSR instance receives the agent's TC interval.
    pub reference_node: u32,
    pub out_of_bounds: OutOfBoundsPolicy,
}

/// Shape of the synthetic world the binary runs against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    pub nodes: u32,
    /// Flow `j` runs from node `j` to node `flows + j`.
    pub flows: u32,
    pub rate_kbps: f64,
    pub packet_size: u32,
    pub traffic_start_secs: f64,
    pub initial_tc_interval_secs: f64,
    pub olsr_priority: i16,
    /// Packets still undelivered this long after sending are counted lost.
    pub max_delay_secs: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            nodes: 20,
            flows: 6,
            rate_kbps: 80.0,
            packet_size: 1024,
            traffic_start_secs: 1.0,
            initial_tc_interval_secs: 5.0,
            olsr_priority: 10,
            max_delay_secs: 10.0,
        }
    }
}

impl ScenarioConfig {
    /// Time between two packets of one flow.
    pub fn packet_interval(&self) -> SimTime {
        SimTime::from_secs_f64(f64::from(self.packet_size) * 8.0 / (self.rate_kbps * 1000.0))
    }
}

impl BridgeConfig {
    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without validating.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        positive("simulation.duration_secs", sim.duration_secs)?;
        positive("simulation.step_interval_secs", sim.step_interval_secs)?;
        if self.step_interval() == SimTime::ZERO {
            return Err(ConfigError::Invalid {
                field: "simulation.step_interval_secs",
                reason: format!("{} rounds to zero nanoseconds", sim.step_interval_secs),
            });
        }
        if sim.step_interval_secs > sim.duration_secs {
            return Err(ConfigError::Invalid {
                field: "simulation.step_interval_secs",
                reason: format!(
                    "{} is longer than the {} s run",
                    sim.step_interval_secs, sim.duration_secs
                ),
            });
        }
        if !self.reward.pdr_threshold.is_finite() || !(0.0..=100.0).contains(&self.reward.pdr_threshold) {
            return Err(ConfigError::Invalid {
                field: "reward.pdr_threshold",
                reason: format!("{} is not a percentage", self.reward.pdr_threshold),
            });
        }
        if let ThroughputWindow::Fixed { secs } = self.stats.throughput_window {
            positive("stats.throughput_window.secs", secs)?;
        }

        let sc = &self.scenario;
        if self.action.reference_node >= sc.nodes {
            return Err(ConfigError::Invalid {
                field: "action.reference_node",
                reason: format!("node {} does not exist in a {}-node scenario", self.action.reference_node, sc.nodes),
            });
        }
        if sc.flows.saturating_mul(2) > sc.nodes {
            return Err(ConfigError::Invalid {
                field: "scenario.flows",
                reason: format!("{} flows need {} nodes, scenario has {}", sc.flows, sc.flows.saturating_mul(2), sc.nodes),
            });
        }
        positive("scenario.rate_kbps", sc.rate_kbps)?;
        if sc.packet_size == 0 {
            return Err(ConfigError::Invalid {
                field: "scenario.packet_size",
                reason: "must be at least one byte".to_string(),
            });
        }
        positive("scenario.initial_tc_interval_secs", sc.initial_tc_interval_secs)?;
        positive("scenario.max_delay_secs", sc.max_delay_secs)?;
        if !sc.traffic_start_secs.is_finite() || sc.traffic_start_secs < 0.0 {
            return Err(ConfigError::Invalid {
                field: "scenario.traffic_start_secs",
                reason: format!("{} is not a valid start time", sc.traffic_start_secs),
            });
        }
        Ok(())
    }

    pub fn duration(&self) -> SimTime {
        SimTime::from_secs_f64(self.simulation.duration_secs)
    }

    pub fn step_interval(&self) -> SimTime {
        SimTime::from_secs_f64(self.simulation.step_interval_secs)
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{value} must be positive"),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_reference_run() {
        let c = BridgeConfig::default();
        assert_eq!(c.simulation.seed, 8);
        assert_eq!(c.duration(), SimTime::from_secs_f64(30.0));
        assert_eq!(c.step_interval(), SimTime::from_millis(100));
        assert_eq!(c.bridge.port, 5555);
        assert_eq!(c.reward.pdr_threshold, 25.0);
        assert_eq!(c.stats.window, StatsWindow::Cumulative);
        assert_eq!(c.stats.throughput_window, ThroughputWindow::Fixed { secs: 20.0 });
        assert_eq!(c.observation.reduce, ObservationReduce::LastNode);
        assert_eq!(c.action.out_of_bounds, OutOfBoundsPolicy::Reject);
        assert_eq!(c.scenario.nodes, 20);
        c.validate().unwrap();
    }

    #[test]
    fn empty_document_is_all_defaults() {
        assert_eq!(BridgeConfig::from_toml_str("").unwrap(), BridgeConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let c = BridgeConfig::from_toml_str(
            r#"
            [simulation]
            duration_secs = 10.0

            [stats]
            window = "per-step"
            throughput_window = { kind = "elapsed" }

            [action]
            out_of_bounds = "clamp"
            "#,
        )
        .unwrap();
        assert_eq!(c.simulation.duration_secs, 10.0);
        assert_eq!(c.simulation.step_interval_secs, 0.1);
        assert_eq!(c.stats.window, StatsWindow::PerStep);
        assert_eq!(c.stats.throughput_window, ThroughputWindow::Elapsed);
        assert_eq!(c.action.out_of_bounds, OutOfBoundsPolicy::Clamp);
        assert_eq!(c.bridge, TransportConfig::default());
    }

    #[test]
    fn unknown_key_is_a_parse_error() {
        let err = BridgeConfig::from_toml_str("[simulation]\nsed = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn interval_longer_than_run_is_invalid() {
        let mut c = BridgeConfig::default();
        c.simulation.step_interval_secs = 31.0;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Invalid { field: "simulation.step_interval_secs", .. })
        ));
    }

    #[test]
    fn sub_nanosecond_interval_is_invalid() {
        let mut c = BridgeConfig::default();
        c.simulation.step_interval_secs = 1e-10;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Invalid { field: "simulation.step_interval_secs", .. })
        ));
    }

    #[test]
    fn zero_duration_is_invalid() {
        let mut c = BridgeConfig::default();
        c.simulation.duration_secs = 0.0;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Invalid { field: "simulation.duration_secs", .. })
        ));
    }

    #[test]
    fn reference_node_outside_scenario_is_invalid() {
        let mut c = BridgeConfig::default();
        c.action.reference_node = 20;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Invalid { field: "action.reference_node", .. })
        ));
    }

    #[test]
    fn too_many_flows_is_invalid() {
        let mut c = BridgeConfig::default();
        c.scenario.flows = 11;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid { field: "scenario.flows", .. })));
    }

    #[test]
    fn packet_interval_for_default_traffic() {
        // 1024 B at 80 kb/s.
        assert_eq!(ScenarioConfig::default().packet_interval(), SimTime::from_nanos(102_400_000));
    }

    #[test]
    fn load_reads_and_validates_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[bridge]\nport = 6000\n[reward]\npdr_threshold = 40.0").unwrap();
        let c = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(c.bridge.port, 6000);
        assert_eq!(c.reward.pdr_threshold, 40.0);
    }

    #[test]
    fn load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[simulation]\nstep_interval_secs = -1.0").unwrap();
        assert!(matches!(BridgeConfig::load(file.path()), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BridgeConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn serializes_back_to_toml() {
        let text = toml::to_string_pretty(&BridgeConfig::default()).unwrap();
        assert_eq!(BridgeConfig::from_toml_str(&text).unwrap(), BridgeConfig::default());
    }
}

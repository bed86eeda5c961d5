use std::path::PathBuf;

use clap::Parser;

use crate::config::BridgeConfig;

#[derive(Parser, Debug)]
#[command(name = "routing-gym-bridge")]
#[command(version)]
#[command(about = "Drive an OLSR TC interval from an external reinforcement-learning agent")]
pub struct Args {
    /// TOML configuration file; CLI flags override its values
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Port the agent connects to
    #[arg(long)]
    pub open_gym_port: Option<u16>,

    /// Seed of the synthetic scenario
    #[arg(long)]
    pub sim_seed: Option<u64>,

    /// Simulated run length in seconds
    #[arg(long)]
    pub sim_time: Option<f64>,

    /// Simulated seconds between two agent steps
    #[arg(long)]
    pub step_time: Option<f64>,

    /// Address to listen on for the agent
    #[arg(long)]
    pub bind: Option<String>,

    /// Delivery-ratio threshold (percent) below which the reward is zero
    #[arg(long)]
    pub pdr_threshold: Option<f64>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Args {
    /// Apply every flag that was given on top of `config`.
    pub fn overlay(&self, config: &mut BridgeConfig) {
        if let Some(port) = self.open_gym_port {
            config.bridge.port = port;
        }
        if let Some(seed) = self.sim_seed {
            config.simulation.seed = seed;
        }
        if let Some(secs) = self.sim_time {
            config.simulation.duration_secs = secs;
        }
        if let Some(secs) = self.step_time {
            config.simulation.step_interval_secs = secs;
        }
        if let Some(addr) = &self.bind {
            config.bridge.bind_address = addr.clone();
        }
        if let Some(threshold) = self.pdr_threshold {
            config.reward.pdr_threshold = threshold;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_minimal() {
        let args = Args::parse_from(["routing-gym-bridge"]);
        assert!(args.config.is_none());
        assert!(args.open_gym_port.is_none());
        assert!(args.sim_seed.is_none());
        assert_eq!(args.log_level, "info");
        assert!(!args.print_config);
    }

    #[test]
    fn test_args_parse_full() {
        let args = Args::parse_from([
            "routing-gym-bridge",
            "-c",
            "run.toml",
            "--open-gym-port",
            "6000",
            "--sim-seed",
            "3",
            "--sim-time",
            "60",
            "--step-time",
            "0.5",
            "--bind",
            "0.0.0.0",
            "--pdr-threshold",
            "40",
            "--log-level",
            "debug",
            "--print-config",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("run.toml")));
        assert_eq!(args.open_gym_port, Some(6000));
        assert_eq!(args.sim_seed, Some(3));
        assert_eq!(args.sim_time, Some(60.0));
        assert_eq!(args.step_time, Some(0.5));
        assert_eq!(args.bind.as_deref(), Some("0.0.0.0"));
        assert_eq!(args.pdr_threshold, Some(40.0));
        assert_eq!(args.log_level, "debug");
        assert!(args.print_config);
    }

    #[test]
    fn test_overlay_without_flags_keeps_config() {
        let args = Args::parse_from(["routing-gym-bridge"]);
        let mut config = BridgeConfig::default();
        args.overlay(&mut config);
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_overlay_flags_win_over_file() {
        let mut config = BridgeConfig::from_toml_str("[bridge]\nport = 7000\n[simulation]\nseed = 1\n").unwrap();
        let args = Args::parse_from(["routing-gym-bridge", "--open-gym-port", "5556", "--step-time", "0.2"]);
        args.overlay(&mut config);
        assert_eq!(config.bridge.port, 5556);
        assert_eq!(config.simulation.step_interval_secs, 0.2);
        // Not given on the command line.
        assert_eq!(config.simulation.seed, 1);
    }

    #[test]
    fn test_args_rejects_bad_port() {
        assert!(Args::try_parse_from(["routing-gym-bridge", "--open-gym-port", "70000"]).is_err());
    }
}

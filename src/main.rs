use clap::Parser;
use colored::*;
use tracing::{error, info};

use routing_gym_bridge::bridge::accept_agent;
use routing_gym_bridge::cli::Args;
use routing_gym_bridge::logging;
use routing_gym_bridge::telemetry::RunSummary;
use routing_gym_bridge::{BridgeConfig, EpisodeReport, RoutingEnv, StepScheduler, SyntheticScenario};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init_tracing(&args.log_level).map_err(|e| format!("Failed to initialise logging: {}", e))?;

    let mut config = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    args.overlay(&mut config);
    config.validate()?;

    if args.print_config {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut world = SyntheticScenario::build(&config.scenario, config.simulation.seed)?;
    let env = RoutingEnv::from_config(&config, world.registry(), world.telemetry());
    let mut scheduler = StepScheduler::new(env, config.step_interval());

    let (mut channel, peer) = accept_agent(&config.bridge).await?;
    info!(peer = %peer, run_id = %scheduler.run_id(), "agent connected");

    let result = scheduler.run(config.duration(), &mut channel, &mut world).await;
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, step = scheduler.steps(), "episode aborted");
            return Err(e.into());
        }
    };

    let summary = scheduler.env_mut().final_report(report.end_time);
    for line in summary_lines(&report, &summary) {
        println!("{}", line);
    }
    Ok(())
}

fn summary_lines(report: &EpisodeReport, summary: &RunSummary) -> Vec<String> {
    let delay = match summary.avg_delay_secs {
        Some(secs) => format!("{:.2} ms", secs * 1000.0),
        None => "n/a".to_string(),
    };
    let ending = if report.stopped_by_agent {
        "stopped by agent".yellow().to_string()
    } else {
        match report.end_reason {
            Some(reason) => format!("{:?}", reason).green().to_string(),
            None => "n/a".to_string(),
        }
    };
    vec![
        String::new(),
        "Average Results".bright_cyan().bold().to_string(),
        format!("  run id            {}", report.run_id),
        format!("  steps             {} ({})", report.steps, ending),
        format!(
            "  actions           {} applied, {} rejected",
            report.actions_applied, report.actions_rejected
        ),
        format!("  mean reward       {:.4}", report.mean_reward()),
        format!("  flows             {}", summary.flow_count),
        format!("  throughput        {:.4} Mbps", summary.avg_throughput_mbps),
        format!("  delivery ratio    {:.2} %", summary.avg_delivery_ratio),
        format!("  end-to-end delay  {}", delay),
        format!(
            "  packets           {} tx, {} rx, {} lost",
            summary.tx_packets, summary.rx_packets, summary.lost_packets
        ),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

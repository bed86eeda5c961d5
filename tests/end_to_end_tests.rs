//! Full episodes: synthetic world, routing environment, scheduler and an
//! agent on the other end of the bridge.

use routing_gym_bridge::bridge::{JsonLines, LoopbackAgent};
use routing_gym_bridge::routing::Capability;
use routing_gym_bridge::{
    AgentMessage, BridgeConfig, BridgeError, EndReason, RoutingEnv, SimMessage, SimTime, StepScheduler,
    SyntheticScenario,
};

fn build(config: &BridgeConfig) -> (SyntheticScenario, StepScheduler<RoutingEnv>) {
    let world = SyntheticScenario::build(&config.scenario, config.simulation.seed).unwrap();
    let env = RoutingEnv::from_config(config, world.registry(), world.telemetry());
    (world, StepScheduler::new(env, config.step_interval()))
}

fn rewards(sent: &[SimMessage]) -> Vec<f32> {
    sent.iter()
        .filter_map(|m| match m {
            SimMessage::State { reward, .. } => Some(*reward),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn default_run_exchanges_three_hundred_steps() {
    let config = BridgeConfig::default();
    let (mut world, mut sched) = build(&config);
    let mut agent = LoopbackAgent::new(|_: &SimMessage| Some(AgentMessage::Action { values: vec![3.0] }));

    let report = sched.run(config.duration(), &mut agent, &mut world).await.unwrap();

    assert_eq!(agent.states(), 300);
    assert_eq!(agent.ends(), 1);
    assert_eq!(report.steps, 300);
    assert_eq!(report.actions_applied, 300);
    assert_eq!(report.end_reason, Some(EndReason::SimulationEnd));
    assert_eq!(world.tc_interval(0), Some(3.0));
    // Only the reference node is retuned.
    assert_eq!(world.tc_interval(1), Some(5.0));
}

#[tokio::test]
async fn step_count_is_whole_intervals_in_the_run() {
    // A trailing partial interval gets no step.
    let cases = [(10.0, 0.5, 20), (1.0, 0.1, 10), (2.0, 0.3, 6), (1.05, 0.1, 10), (0.25, 0.1, 2)];
    for (duration, interval, expected) in cases {
        let mut config = BridgeConfig::default();
        config.simulation.duration_secs = duration;
        config.simulation.step_interval_secs = interval;
        let (mut world, mut sched) = build(&config);
        let mut agent = LoopbackAgent::new(|_: &SimMessage| Some(AgentMessage::Action { values: vec![2.5] }));
        let report = sched.run(config.duration(), &mut agent, &mut world).await.unwrap();
        assert_eq!(agent.states(), expected, "{duration}s / {interval}s");
        assert_eq!(agent.ends(), 1);
        assert_eq!(report.steps, expected as u64);
        assert_eq!(report.end_time, config.duration());
    }
}

#[tokio::test]
async fn reward_is_zero_before_traffic_then_a_ratio() {
    let config = BridgeConfig::default();
    let (mut world, mut sched) = build(&config);
    let mut agent = LoopbackAgent::new(|_: &SimMessage| Some(AgentMessage::Action { values: vec![3.0] }));
    sched.run(config.duration(), &mut agent, &mut world).await.unwrap();

    let r = rewards(&agent.sent);
    // Traffic starts at 1 s; the first ten steps see no flows.
    assert!(r[..10].iter().all(|&v| v == 0.0));
    assert!(r.iter().all(|&v| (0.0..=1.0).contains(&v)));
    assert!(r[20..].iter().any(|&v| v > 0.0));
}

#[tokio::test]
async fn observations_stay_in_declared_space() {
    let config = BridgeConfig::default();
    let (mut world, mut sched) = build(&config);
    let mut agent = LoopbackAgent::new(|_: &SimMessage| Some(AgentMessage::Action { values: vec![4.0] }));
    sched.run(config.duration(), &mut agent, &mut world).await.unwrap();

    for msg in &agent.sent {
        if let SimMessage::State { observation, extra_info, done, .. } = msg {
            assert_eq!(observation.shape, vec![1]);
            let v = observation.values[0];
            assert!((1.0..=3.0).contains(&v), "observation {v}");
            assert_eq!(extra_info, "Additional Info");
            assert!(!done);
        }
    }
}

#[tokio::test]
async fn out_of_bounds_actions_leave_the_timer_alone() {
    let config = BridgeConfig::default();
    let (mut world, mut sched) = build(&config);
    let mut agent = LoopbackAgent::new(|_: &SimMessage| Some(AgentMessage::Action { values: vec![9.0] }));
    let report = sched.run(SimTime::from_secs_f64(1.0), &mut agent, &mut world).await.unwrap();

    assert_eq!(report.actions_applied, 0);
    assert_eq!(report.actions_rejected, 10);
    assert_eq!(world.tc_interval(0), Some(5.0));
}

#[tokio::test]
async fn clamp_policy_applies_the_nearest_bound() {
    let config = BridgeConfig::from_toml_str("[action]\nout_of_bounds = \"clamp\"\n").unwrap();
    let (mut world, mut sched) = build(&config);
    let mut agent = LoopbackAgent::new(|_: &SimMessage| Some(AgentMessage::Action { values: vec![1.0] }));
    let report = sched.run(SimTime::from_secs_f64(0.5), &mut agent, &mut world).await.unwrap();
    assert_eq!(world.tc_interval(0), Some(2.0));
    assert_eq!(report.actions_applied, 5);
    assert_eq!(report.actions_rejected, 0);
}

#[tokio::test]
async fn forward_policy_accepts_two_element_actions() {
    let config = BridgeConfig::from_toml_str("[action]\nout_of_bounds = \"forward\"\n").unwrap();
    let (mut world, mut sched) = build(&config);
    let mut agent = LoopbackAgent::new(|_: &SimMessage| Some(AgentMessage::Action { values: vec![3.5, 3.5] }));
    let report = sched.run(SimTime::from_secs_f64(0.5), &mut agent, &mut world).await.unwrap();
    assert_eq!(report.actions_applied, 5);
    assert_eq!(world.tc_interval(0), Some(3.5));
}

#[tokio::test]
async fn same_seed_same_rewards() {
    async fn run_once() -> Vec<f32> {
        let mut config = BridgeConfig::default();
        config.simulation.duration_secs = 5.0;
        let (mut world, mut sched) = build(&config);
        let mut agent = LoopbackAgent::new(|_: &SimMessage| Some(AgentMessage::Action { values: vec![3.2] }));
        sched.run(config.duration(), &mut agent, &mut world).await.unwrap();
        rewards(&agent.sent)
    }
    assert_eq!(run_once().await, run_once().await);
}

#[tokio::test]
async fn final_report_covers_every_flow() {
    let config = BridgeConfig::default();
    let (mut world, mut sched) = build(&config);
    let mut agent = LoopbackAgent::new(|_: &SimMessage| Some(AgentMessage::Action { values: vec![3.0] }));
    let report = sched.run(config.duration(), &mut agent, &mut world).await.unwrap();

    let summary = sched.env_mut().final_report(report.end_time);
    assert_eq!(summary.flow_count, 6);
    assert!(summary.tx_packets > 0);
    assert!(summary.rx_packets <= summary.tx_packets);
    assert!(summary.avg_delivery_ratio > 0.0 && summary.avg_delivery_ratio <= 100.0);
    assert!(summary.avg_delay_secs.is_some());
}

#[tokio::test]
async fn agent_over_json_lines_drives_the_episode() {
    let mut config = BridgeConfig::default();
    config.simulation.duration_secs = 2.0;
    let (mut world, mut sched) = build(&config);

    let (sim_side, agent_side) = tokio::io::duplex(64 * 1024);
    let agent = tokio::spawn(async move {
        let mut ch = JsonLines::new(agent_side);
        let mut states = 0_u32;
        loop {
            let msg: SimMessage = match ch.read_message().await {
                Ok(m) => m,
                Err(BridgeError::ChannelClosed) => return (states, false),
                Err(e) => panic!("agent read failed: {e}"),
            };
            match msg {
                SimMessage::Init { .. } => ch.write_message(&AgentMessage::InitAck).await.unwrap(),
                SimMessage::State { observation, .. } => {
                    states += 1;
                    // A toy policy: map quality 1..3 onto TC 2..4.
                    let tc = observation.values[0] + 1.0;
                    ch.write_message(&AgentMessage::Action { values: vec![tc] }).await.unwrap();
                }
                SimMessage::End { reason, .. } => return (states, reason == EndReason::SimulationEnd),
            }
        }
    });

    let mut channel = JsonLines::new(sim_side);
    let report = sched.run(config.duration(), &mut channel, &mut world).await.unwrap();
    let (states, saw_end) = agent.await.unwrap();

    assert_eq!(report.steps, 20);
    assert_eq!(states, 20);
    assert!(saw_end);
    let tc = world.registry().resolve(0, Capability::Olsr).unwrap().borrow().timer_parameter();
    assert!((2.0..=4.0).contains(&tc));
}

#[tokio::test]
async fn agent_stop_leaves_world_at_stop_time() {
    let config = BridgeConfig::default();
    let (mut world, mut sched) = build(&config);
    let mut agent = LoopbackAgent::new(|msg: &SimMessage| match msg {
        SimMessage::State { sim_time, .. } if *sim_time >= 1.95 => Some(AgentMessage::Stop),
        _ => Some(AgentMessage::Action { values: vec![3.0] }),
    });
    let report = sched.run(config.duration(), &mut agent, &mut world).await.unwrap();

    assert!(report.stopped_by_agent);
    // The step at 2.0 s is sent, then the agent stops.
    assert_eq!(report.steps, 21);
    assert_eq!(report.actions_applied, 20);
    assert_eq!(agent.ends(), 0);
    assert_eq!(report.end_time, SimTime::from_secs_f64(2.0));
}

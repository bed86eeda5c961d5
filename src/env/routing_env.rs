//! Concrete environment: OLSR quality in, TC interval out, delivery ratio as
//! reward.

use tracing::warn;

use super::{Environment, StepState};
use crate::config::BridgeConfig;
use crate::error::SpaceError;
use crate::reward::{Reward, RewardFunction};
use crate::routing::{ActionApplier, ObservationProvider, ObservationReduce, OutOfBoundsPolicy, SharedRegistry};
use crate::sim::SimTime;
use crate::spaces::{Action, Observation, Space};
use crate::telemetry::{AggregateStats, FlowStatsAggregator, RunSummary, SharedTelemetry, StatsWindow, ThroughputWindow};

pub struct RoutingEnv {
    observer: ObservationProvider,
    applier: ActionApplier,
    aggregator: FlowStatsAggregator,
    reward_fn: RewardFunction,
    last_stats: AggregateStats,
}

impl RoutingEnv {
    /// Environment with default thresholds, reduction and bounds policy.
    pub fn new(registry: SharedRegistry, telemetry: SharedTelemetry) -> Self {
        Self {
            observer: ObservationProvider::new(registry.clone()),
            applier: ActionApplier::new(registry),
            aggregator: FlowStatsAggregator::new(telemetry),
            reward_fn: RewardFunction::default(),
            last_stats: AggregateStats::default(),
        }
    }

    pub fn from_config(config: &BridgeConfig, registry: SharedRegistry, telemetry: SharedTelemetry) -> Self {
        Self::new(registry, telemetry)
            .with_reward(RewardFunction::new(config.reward.pdr_threshold))
            .with_observation_reduce(config.observation.reduce)
            .with_reference_node(config.action.reference_node)
            .with_action_policy(config.action.out_of_bounds)
            .with_stats_window(config.stats.window)
            .with_throughput_window(config.stats.throughput_window)
    }

    pub fn with_reward(mut self, reward_fn: RewardFunction) -> Self {
        self.reward_fn = reward_fn;
        self
    }

    pub fn with_observation_reduce(mut self, reduce: ObservationReduce) -> Self {
        self.observer = self.observer.with_reduce(reduce);
        self
    }

    pub fn with_reference_node(mut self, node: u32) -> Self {
        self.applier = self.applier.with_reference_node(node);
        self
    }

    pub fn with_action_policy(mut self, policy: OutOfBoundsPolicy) -> Self {
        self.applier = self.applier.with_policy(policy);
        self
    }

    pub fn with_stats_window(mut self, window: StatsWindow) -> Self {
        self.aggregator = self.aggregator.with_window(window);
        self
    }

    pub fn with_throughput_window(mut self, window: ThroughputWindow) -> Self {
        self.aggregator = self.aggregator.with_throughput_window(window);
        self
    }

    /// Statistics behind the most recent reward.
    pub fn last_stats(&self) -> AggregateStats {
        self.last_stats
    }

    /// End-of-run per-flow report.
    pub fn final_report(&mut self, elapsed: SimTime) -> RunSummary {
        self.aggregator.final_report(elapsed)
    }
}

impl Environment for RoutingEnv {
    fn observation_space(&self) -> Space {
        Space::Box(self.observer.space().clone())
    }

    fn action_space(&self) -> Space {
        Space::Box(self.applier.space().clone())
    }

    fn observe(&mut self) -> Result<Observation, SpaceError> {
        self.observer.observe()
    }

    fn reward(&mut self, state: &StepState) -> Reward {
        self.last_stats = self.aggregator.compute(state.sim_time);
        self.reward_fn.compute(&self.last_stats)
    }

    fn execute(&mut self, action: &Action) -> bool {
        match self.applier.apply(action) {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, values = ?action.values, "action not applied");
                false
            }
        }
    }

    fn reset(&mut self) {
        self.aggregator.reset();
        self.last_stats = AggregateStats::default();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

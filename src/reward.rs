//! # Module: reward
//!
//! Maps the aggregate delivery ratio onto a scalar reward in `[0, 1]`.
//! Below the threshold the reward is zero; at or above it, the ratio itself
//! scaled to `[0, 1]`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::telemetry::AggregateStats;

/// Delivery ratio (percent) under which the agent earns nothing.
pub const DEFAULT_PDR_THRESHOLD: f64 = 25.0;

/// One step's reward.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reward(pub f32);

impl Reward {
    pub fn value(self) -> f32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardFunction {
    pdr_threshold: f64,
}

impl Default for RewardFunction {
    fn default() -> Self {
        Self {
            pdr_threshold: DEFAULT_PDR_THRESHOLD,
        }
    }
}

impl RewardFunction {
    pub fn new(pdr_threshold: f64) -> Self {
        Self { pdr_threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.pdr_threshold
    }

    pub fn compute(&self, stats: &AggregateStats) -> Reward {
        let pdr = stats.avg_delivery_ratio;
        let reward = if pdr >= self.pdr_threshold {
            (pdr / 100.0).clamp(0.0, 1.0) as f32
        } else {
            0.0
        };
        debug!(pdr, threshold = self.pdr_threshold, reward, "reward computed");
        Reward(reward)
    }
}

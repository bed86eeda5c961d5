//! # Module: env
//!
//! ## Responsibility
//! The single capability the step scheduler drives: declare spaces, produce
//! one step's observation/reward/done/info, execute one action, reset.
//! [`RoutingEnv`] is the concrete implementation that wires the observation
//! provider, flow aggregator, reward function and action applier together.
//!
//! ## NOT Responsible For
//! - Timing (the scheduler decides when a step happens)
//! - Talking to the agent (see [`crate::bridge`])

pub mod routing_env;

use serde::{Deserialize, Serialize};

use crate::error::SpaceError;
use crate::reward::Reward;
use crate::sim::SimTime;
use crate::spaces::{Action, Observation, Space};

pub use routing_env::RoutingEnv;

/// Free-form info string attached to every step.
pub const EXTRA_INFO: &str = "Additional Info";

/// Position of the control loop on the simulation clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepState {
    /// Zero-based index of the step being executed.
    pub step_index: u64,
    pub sim_time: SimTime,
}

/// Everything the agent receives for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: Reward,
    pub done: bool,
    pub extra_info: String,
}

/// A gym-style environment living inside the simulation.
pub trait Environment {
    fn observation_space(&self) -> Space;

    fn action_space(&self) -> Space;

    /// Current observation. An error here means the container could not be
    /// built and the episode cannot continue.
    fn observe(&mut self) -> Result<Observation, SpaceError>;

    fn reward(&mut self, state: &StepState) -> Reward;

    /// Whether the episode ended on its own. Time-bounded environments never
    /// report this; the simulation stop time ends them.
    fn game_over(&self) -> bool {
        false
    }

    fn extra_info(&self) -> String {
        EXTRA_INFO.to_string()
    }

    /// Execute one agent action; `false` when it was not applied.
    fn execute(&mut self, action: &Action) -> bool;

    /// Return to the start-of-episode state.
    fn reset(&mut self) {}

    /// Collect one step in the order observation, reward, done, info.
    fn step(&mut self, state: &StepState) -> Result<StepOutcome, SpaceError> {
        let observation = self.observe()?;
        let reward = self.reward(state);
        Ok(StepOutcome {
            observation,
            reward,
            done: self.game_over(),
            extra_info: self.extra_info(),
        })
    }
}

//! A gym-style control loop embedded in a discrete-event network simulation.
//!
//! At a fixed simulated interval the [`StepScheduler`] samples OLSR link
//! quality ([`routing::ObservationProvider`]) and flow telemetry
//! ([`telemetry::FlowStatsAggregator`]), turns the delivery ratio into a
//! reward ([`reward::RewardFunction`]), hands both to an external agent over
//! the [`bridge`] and applies the TC interval it answers with
//! ([`routing::ActionApplier`]).

pub mod bridge;
pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod logging;
pub mod reward;
pub mod routing;
pub mod scenario;
pub mod sim;
pub mod spaces;
pub mod telemetry;

pub use bridge::{AgentChannel, AgentMessage, EndReason, SimMessage};
pub use config::BridgeConfig;
pub use env::{Environment, RoutingEnv, StepOutcome, StepState};
pub use error::{ActionError, BridgeError, ConfigError, ResolveError, SpaceError};
pub use reward::{Reward, RewardFunction};
pub use scenario::SyntheticScenario;
pub use sim::{EpisodeReport, NetworkModel, SimTime, StepScheduler};

//! # Stage: Simulation
//!
//! ## Responsibility
//! Own simulated time. [`clock`] is the discrete-event queue, [`scheduler`]
//! drives the environment step on it and runs the agent exchange.
//!
//! ## Guarantees
//! - Integer-nanosecond clock: `D / I` steps land exactly on `k * I`
//! - The world is advanced to an event's time before the event fires
//!
//! ## NOT Responsible For
//! - Modelling the network itself (see [`NetworkModel`] implementors)

pub mod clock;
pub mod scheduler;

pub use clock::{EventId, SimTime, Simulator};
pub use scheduler::{BridgeEvent, EpisodeReport, Phase, StepScheduler};

/// The part of the world that evolves between control steps: traffic,
/// losses, protocol quality.
pub trait NetworkModel {
    /// Bring the world up to `now`. Called with non-decreasing times.
    fn advance_to(&mut self, now: SimTime);
}

/// A world where nothing happens between steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleNetwork;

impl NetworkModel for IdleNetwork {
    fn advance_to(&mut self, _now: SimTime) {}
}

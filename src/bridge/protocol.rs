//! Wire messages exchanged with the agent.
//!
//! One JSON object per line, discriminated by a `type` field. The
//! simulation speaks first: `init` once, then one `state` per step (each
//! answered by the agent), then a final `end`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::spaces::{Observation, Space};

/// Why the simulation side is closing the episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// The fixed simulation stop time was reached.
    SimulationEnd,
    /// The environment reported game over.
    GameOver,
}

/// Simulation → agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimMessage {
    /// Space declarations. Sent once, before the first step.
    Init {
        run_id: Uuid,
        observation_space: Space,
        action_space: Space,
    },
    /// One step's state. The agent must answer with `action` or `stop`.
    State {
        step: u64,
        sim_time: f64,
        observation: Observation,
        reward: f32,
        done: bool,
        extra_info: String,
    },
    /// Final notification; the channel closes right after.
    End {
        step: u64,
        sim_time: f64,
        reason: EndReason,
    },
}

impl SimMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            SimMessage::Init { .. } => "init",
            SimMessage::State { .. } => "state",
            SimMessage::End { .. } => "end",
        }
    }
}

/// Agent → simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    /// Acknowledges `init`.
    InitAck,
    /// Answer to `state`: the next action, flattened.
    Action { values: Vec<f32> },
    /// Ask the simulation to stop now. No `end` is sent afterwards.
    Stop,
}

impl AgentMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            AgentMessage::InitAck => "init_ack",
            AgentMessage::Action { .. } => "action",
            AgentMessage::Stop => "stop",
        }
    }
}

//! # Stage: Bridge
//!
//! ## Responsibility
//! Carry the per-step exchange between the simulation and the external
//! agent: message types ([`protocol`]) and the channel they travel on
//! ([`channel`]).
//!
//! ## Guarantees
//! - One JSON object per line, `type`-tagged, in both directions
//! - EOF from the agent surfaces as [`BridgeError::ChannelClosed`](crate::error::BridgeError::ChannelClosed)
//!
//! ## NOT Responsible For
//! - Deciding when a step happens (see [`crate::sim::scheduler`])
//! - What the observation or reward mean (see [`crate::env`])

pub mod channel;
pub mod protocol;

pub use channel::{accept_agent, AgentChannel, JsonLines, LoopbackAgent, TcpChannel};
pub use protocol::{AgentMessage, EndReason, SimMessage};

//! # Module: error
//!
//! Crate error enums. Recoverable conditions (`ResolveError`, `ActionError`)
//! are absorbed where they are detected and only logged; `SpaceError` and
//! `BridgeError` end the episode.

use std::path::PathBuf;

use crate::routing::Capability;

/// Failure to locate a routing-protocol handle on a node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The node index is outside the registry.
    #[error("node {node} does not exist (registry holds {count} nodes)")]
    UnknownNode { node: u32, count: usize },
    /// The node has no list-routing facility installed at all.
    #[error("node {node} has no list-routing facility")]
    NoListRouting { node: u32 },
    /// The node has list routing, but no protocol offering the capability.
    #[error("node {node} has no {capability} routing protocol installed")]
    ProtocolMissing { node: u32, capability: Capability },
}

/// Rejection of an agent action before it reaches the protocol.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    #[error("action shape mismatch: expected {expected:?}, got {got:?}")]
    Shape { expected: Vec<u32>, got: Vec<u32> },
    #[error("action value {0} is not finite")]
    NonFinite(f32),
    #[error("action value {value} outside [{low}, {high}]")]
    OutOfBounds { value: f32, low: f32, high: f32 },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Invalid space declaration or container.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpaceError {
    #[error("invalid box bounds: low {low} > high {high}")]
    InvalidBounds { low: f32, high: f32 },
    #[error("container holds {got} values but shape {shape:?} needs {expected}")]
    ShapeMismatch {
        shape: Vec<u32>,
        expected: usize,
        got: usize,
    },
}

/// Failure of the agent exchange. Every variant ends the episode.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("agent channel I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed agent message: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("unexpected agent message: expected {expected}, got {got}")]
    UnexpectedMessage {
        expected: &'static str,
        got: String,
    },
    #[error("agent closed the channel")]
    ChannelClosed,
    #[error("observation container could not be built: {0}")]
    Space(#[from] SpaceError),
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

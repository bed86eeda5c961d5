//! Observation provider: reads the OLSR quality scalar across nodes.

use serde::{Deserialize, Serialize};
use tracing::error;

use super::{Capability, SharedRegistry};
use crate::error::SpaceError;
use crate::spaces::{observation_space, BoxContainer, BoxSpace, Observation};

/// Value a node contributes when its protocol cannot be resolved.
pub const FALLBACK_QUALITY: f32 = 0.0;

/// How per-node quality values are reduced to the single observed float.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObservationReduce {
    /// Walk every node but keep only the last node's value.
    #[default]
    LastNode,
    /// Mean over all nodes. Changes what the agent sees; opt-in only.
    Mean,
}

pub struct ObservationProvider {
    registry: SharedRegistry,
    capability: Capability,
    reduce: ObservationReduce,
    space: BoxSpace,
}

impl ObservationProvider {
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            registry,
            capability: Capability::Olsr,
            reduce: ObservationReduce::default(),
            space: observation_space(),
        }
    }

    pub fn with_reduce(mut self, reduce: ObservationReduce) -> Self {
        self.reduce = reduce;
        self
    }

    pub fn space(&self) -> &BoxSpace {
        &self.space
    }

    /// Quality scalar of every node, in node order. Nodes whose protocol
    /// cannot be resolved contribute [`FALLBACK_QUALITY`].
    pub fn quality_per_node(&self) -> Vec<f32> {
        (0..self.registry.node_count())
            .map(|node| match self.registry.resolve(node, self.capability) {
                Ok(handle) => handle.borrow().quality_scalar() as f32,
                Err(e) => {
                    error!(node, error = %e, "failed to resolve routing protocol, using fallback quality");
                    FALLBACK_QUALITY
                }
            })
            .collect()
    }

    /// Build the observation container. Has no effect on the protocols, so
    /// two calls without a simulation step in between return the same value.
    pub fn observe(&self) -> Result<Observation, SpaceError> {
        let values = self.quality_per_node();
        let value = match self.reduce {
            ObservationReduce::LastNode => values.last().copied().unwrap_or(FALLBACK_QUALITY),
            ObservationReduce::Mean if values.is_empty() => FALLBACK_QUALITY,
            ObservationReduce::Mean => values.iter().sum::<f32>() / values.len() as f32,
        };
        BoxContainer::new(self.space.shape.clone(), vec![value])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

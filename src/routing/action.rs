//! Action applier: validates an agent action and writes it into the
//! reference node's TC interval.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::{Capability, SharedRegistry};
use crate::error::ActionError;
use crate::spaces::{action_space, Action, BoxSpace};

/// What to do with a finite action outside the declared action space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutOfBoundsPolicy {
    /// Refuse it; the protocol is left untouched.
    #[default]
    Reject,
    /// Clamp it into `[low, high]` and apply.
    Clamp,
    /// Apply it unchanged. The bounds are only advice to the agent.
    Forward,
}

pub struct ActionApplier {
    registry: SharedRegistry,
    capability: Capability,
    reference_node: u32,
    space: BoxSpace,
    policy: OutOfBoundsPolicy,
}

impl ActionApplier {
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            registry,
            capability: Capability::Olsr,
            reference_node: 0,
            space: action_space(),
            policy: OutOfBoundsPolicy::default(),
        }
    }

    pub fn with_reference_node(mut self, node: u32) -> Self {
        self.reference_node = node;
        self
    }

    pub fn with_policy(mut self, policy: OutOfBoundsPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn reference_node(&self) -> u32 {
        self.reference_node
    }

    pub fn space(&self) -> &BoxSpace {
        &self.space
    }

    /// Extract the TC interval from `action` and run it through the bounds
    /// policy.
    ///
    /// `Reject` and `Clamp` demand the exact action shape. `Forward` reads
    /// the first element of any non-empty container and ignores the rest.
    pub fn decode(&self, action: &Action) -> Result<f32, ActionError> {
        let shape_error = || ActionError::Shape {
            expected: self.space.shape.clone(),
            got: action.shape.clone(),
        };
        let strict = self.policy != OutOfBoundsPolicy::Forward;
        if strict && (!action.fits(&self.space) || action.len() != self.space.len()) {
            return Err(shape_error());
        }
        let value = action.get(0).ok_or_else(shape_error)?;
        if action.len() > 1 {
            warn!(
                extra = action.len() - 1,
                used = value,
                "action has more elements than the action space, using the first"
            );
        }
        if !value.is_finite() {
            return Err(ActionError::NonFinite(value));
        }
        if self.space.contains(value) {
            return Ok(value);
        }

        let (low, high) = (self.space.low, self.space.high);
        match self.policy {
            OutOfBoundsPolicy::Reject => Err(ActionError::OutOfBounds { value, low, high }),
            OutOfBoundsPolicy::Clamp => {
                let clamped = self.space.clamp(value);
                warn!(value, clamped, low, high, "action outside action space, clamping");
                Ok(clamped)
            }
            OutOfBoundsPolicy::Forward => {
                warn!(value, low, high, "action outside action space, forwarding unchanged");
                Ok(value)
            }
        }
    }

    /// Apply `action` to the reference node. On error nothing is mutated.
    ///
    /// # Returns
    /// The TC interval, in seconds, that was written to the protocol.
    pub fn apply(&self, action: &Action) -> Result<f32, ActionError> {
        let value = self.decode(action)?;

        let handle = self
            .registry
            .resolve(self.reference_node, self.capability)
            .map_err(|e| {
                error!(node = self.reference_node, error = %e, "failed to resolve routing protocol for action");
                e
            })?;

        handle.borrow_mut().set_timer_parameter(f64::from(value));
        info!(node = self.reference_node, tc_interval = value, "tc interval adjusted");
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

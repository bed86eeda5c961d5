//! # Module: spaces
//!
//! Gym-style space declarations and the box container that carries
//! observations and actions across the bridge.
//!
//! Both spaces are one-element float boxes and are declared once at startup:
//! the observation is the OLSR quality scalar in `[1, 3]`, the action is the
//! TC interval in seconds, `[2, 5]`.

use serde::{Deserialize, Serialize};

use crate::error::SpaceError;

/// Lower bound of the quality scalar.
pub const OBS_LOW: f32 = 1.0;
/// Upper bound of the quality scalar.
pub const OBS_HIGH: f32 = 3.0;
/// Shortest TC interval the agent is offered (seconds).
pub const ACTION_LOW: f32 = 2.0;
/// Longest TC interval the agent is offered (seconds).
pub const ACTION_HIGH: f32 = 5.0;

/// Element type advertised for a box space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Float,
}

/// A bounded n-dimensional box with the same bounds on every element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSpace {
    pub shape: Vec<u32>,
    pub low: f32,
    pub high: f32,
    pub dtype: Dtype,
}

impl BoxSpace {
    pub fn new(low: f32, high: f32, shape: Vec<u32>, dtype: Dtype) -> Result<Self, SpaceError> {
        if !(low <= high) {
            return Err(SpaceError::InvalidBounds { low, high });
        }
        Ok(Self { shape, low, high, dtype })
    }

    /// Number of elements a container of this space holds.
    pub fn len(&self) -> usize {
        self.shape.iter().map(|&d| d as usize).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` when `value` lies inside `[low, high]`. NaN is never contained.
    pub fn contains(&self, value: f32) -> bool {
        value >= self.low && value <= self.high
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.low, self.high)
    }
}

/// The space declaration sent to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Space {
    Box(BoxSpace),
}

impl Space {
    pub fn as_box(&self) -> &BoxSpace {
        match self {
            Space::Box(b) => b,
        }
    }
}

/// Observation space: one float, the quality scalar, in `[1.0, 3.0]`.
pub fn observation_space() -> BoxSpace {
    BoxSpace {
        shape: vec![1],
        low: OBS_LOW,
        high: OBS_HIGH,
        dtype: Dtype::Float,
    }
}

/// Action space: one float, the TC interval in seconds, in `[2.0, 5.0]`.
pub fn action_space() -> BoxSpace {
    BoxSpace {
        shape: vec![1],
        low: ACTION_LOW,
        high: ACTION_HIGH,
        dtype: Dtype::Float,
    }
}

// ---------------------------------------------------------------------------
// BoxContainer
// ---------------------------------------------------------------------------

/// Values of one box-space sample, flattened in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxContainer {
    pub shape: Vec<u32>,
    pub values: Vec<f32>,
}

/// What the environment hands to the agent each step.
pub type Observation = BoxContainer;
/// What the agent hands back. For this bridge: `[tc_interval_secs]`.
pub type Action = BoxContainer;

impl BoxContainer {
    /// Build a container, checking that `values` fills `shape` exactly.
    pub fn new(shape: Vec<u32>, values: Vec<f32>) -> Result<Self, SpaceError> {
        let expected: usize = shape.iter().map(|&d| d as usize).product();
        if expected != values.len() {
            return Err(SpaceError::ShapeMismatch {
                shape,
                expected,
                got: values.len(),
            });
        }
        Ok(Self { shape, values })
    }

    /// A length-1 container.
    pub fn scalar(value: f32) -> Self {
        Self {
            shape: vec![1],
            values: vec![value],
        }
    }

    /// A flat container shaped after its own length, as agents send actions.
    pub fn from_values(values: Vec<f32>) -> Self {
        Self {
            shape: vec![values.len() as u32],
            values,
        }
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `true` when the container's shape matches the space's shape.
    pub fn fits(&self, space: &BoxSpace) -> bool {
        self.shape == space.shape
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_space_is_one_float_between_one_and_three() {
        let space = observation_space();
        assert_eq!(space.shape, vec![1]);
        assert_eq!(space.low, 1.0);
        assert_eq!(space.high, 3.0);
        assert_eq!(space.dtype, Dtype::Float);
        assert_eq!(space.len(), 1);
    }

    #[test]
    fn action_space_is_one_float_between_two_and_five() {
        let space = action_space();
        assert_eq!(space.shape, vec![1]);
        assert_eq!((space.low, space.high), (2.0, 5.0));
    }

    #[test]
    fn box_space_rejects_inverted_bounds() {
        let err = BoxSpace::new(5.0, 2.0, vec![1], Dtype::Float).unwrap_err();
        assert_eq!(err, SpaceError::InvalidBounds { low: 5.0, high: 2.0 });
    }

    #[test]
    fn box_space_rejects_nan_bounds() {
        assert!(BoxSpace::new(f32::NAN, 2.0, vec![1], Dtype::Float).is_err());
    }

    #[test]
    fn contains_is_inclusive_and_rejects_nan() {
        let space = action_space();
        assert!(space.contains(2.0));
        assert!(space.contains(5.0));
        assert!(space.contains(3.5));
        assert!(!space.contains(1.99));
        assert!(!space.contains(5.01));
        assert!(!space.contains(f32::NAN));
    }

    #[test]
    fn space_serializes_as_tagged_box() {
        let json = serde_json::to_value(Space::Box(observation_space())).unwrap();
        assert_eq!(json["type"], "box");
        assert_eq!(json["shape"], serde_json::json!([1]));
        assert_eq!(json["low"], 1.0);
        assert_eq!(json["high"], 3.0);
        assert_eq!(json["dtype"], "float");
    }

    #[test]
    fn container_new_checks_shape() {
        assert!(BoxContainer::new(vec![1], vec![2.5]).is_ok());
        let err = BoxContainer::new(vec![2, 2], vec![1.0]).unwrap_err();
        assert_eq!(
            err,
            SpaceError::ShapeMismatch { shape: vec![2, 2], expected: 4, got: 1 }
        );
    }

    #[test]
    fn container_from_values_is_flat() {
        let c = BoxContainer::from_values(vec![3.5, 3.5]);
        assert_eq!(c.shape, vec![2]);
        assert!(!c.fits(&action_space()));
        assert!(BoxContainer::scalar(3.5).fits(&action_space()));
    }
}

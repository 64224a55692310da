//! Specs of arrays and discrete action spaces.
use crate::{error::QlearnError, Nest};
use serde::{Deserialize, Serialize};

/// Element type of an array described by a spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum DataType {
    /// 8-bit unsigned integer.
    U8,

    /// 32-bit unsigned integer.
    U32,

    /// 64-bit signed integer.
    I64,

    /// 32-bit float.
    F32,

    /// 64-bit float.
    F64,
}

impl DataType {
    /// Returns `true` for integer types.
    pub fn is_int(&self) -> bool {
        matches!(self, Self::U8 | Self::U32 | Self::I64)
    }
}

/// Shape and element type of an array, without the outer (batch, time) dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArraySpec {
    /// Shape of a single element.
    pub shape: Vec<usize>,

    /// Element type.
    pub dtype: DataType,
}

impl ArraySpec {
    /// Creates a spec.
    pub fn new(shape: Vec<usize>, dtype: DataType) -> Self {
        Self {
            shape,
            dtype,
        }
    }

    /// The number of dimensions of a single element.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }
}

/// An [`ArraySpec`] whose values are bounded by `[minimum, maximum]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BoundedArraySpec {
    /// Shape of a single element.
    pub shape: Vec<usize>,

    /// Element type.
    pub dtype: DataType,

    /// Smallest allowed value.
    pub minimum: i64,

    /// Largest allowed value.
    pub maximum: i64,
}

impl BoundedArraySpec {
    /// Creates a spec.
    pub fn new(shape: Vec<usize>, dtype: DataType, minimum: i64, maximum: i64) -> Self {
        Self {
            shape,
            dtype,
            minimum,
            maximum,
        }
    }

    /// Spec of a scalar discrete action taking values in `0..num_actions`.
    pub fn discrete(num_actions: usize) -> Self {
        Self::new(vec![], DataType::I64, 0, num_actions as i64 - 1)
    }

    /// The number of dimensions of a single element.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }
}

/// A discrete action space accepted by Q-learning agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscreteActions {
    /// The number of actions, `maximum - minimum + 1`.
    pub num_actions: usize,

    /// `true` if actions carry a trailing unit axis (spec shape `[1]`).
    pub multi_dim_actions: bool,
}

/// Validates an action spec for value-based agents and derives the number of actions.
///
/// `action_spec` must flatten to exactly one [`BoundedArraySpec`] of rank 0, or of
/// rank 1 with a single element, and its minimum must be 0.
pub fn validate_action_spec(
    action_spec: &Nest<BoundedArraySpec>,
) -> Result<DiscreteActions, QlearnError> {
    let flat = action_spec.flatten();
    if flat.len() != 1 {
        return Err(QlearnError::ConfigurationError(format!(
            "only a single action spec is supported, but saw {}",
            flat.len()
        )));
    }
    let spec = flat[0];

    if spec.rank() > 1 || (spec.rank() == 1 && spec.shape[0] != 1) {
        return Err(QlearnError::ConfigurationError(format!(
            "only one dimensional actions are supported, but saw shape {:?}",
            spec.shape
        )));
    }

    if spec.minimum != 0 {
        return Err(QlearnError::ConfigurationError(format!(
            "action specs should have minimum of 0, but saw {}",
            spec.minimum
        )));
    }

    if spec.maximum < spec.minimum {
        return Err(QlearnError::ConfigurationError(format!(
            "action spec maximum {} is smaller than its minimum {}",
            spec.maximum, spec.minimum
        )));
    }

    Ok(DiscreteActions {
        num_actions: (spec.maximum - spec.minimum + 1) as usize,
        multi_dim_actions: spec.rank() > 0,
    })
}

//! Step types of environment trajectories.
use crate::error::QlearnError;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Position of a time step within an episode.
///
/// Tensors store step types as `u8` codes, see [`StepType::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum StepType {
    /// The first step of an episode.
    First,

    /// Any step that is neither the first nor the last.
    Mid,

    /// The terminal step of an episode.
    Last,
}

impl StepType {
    /// The `u8` code of the step type.
    pub fn code(&self) -> u8 {
        match self {
            Self::First => 0,
            Self::Mid => 1,
            Self::Last => 2,
        }
    }
}

impl TryFrom<u8> for StepType {
    type Error = QlearnError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::First),
            1 => Ok(Self::Mid),
            2 => Ok(Self::Last),
            _ => Err(QlearnError::ShapeError(format!(
                "{} is not a valid step type code",
                code
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_codes() {
        for st in [StepType::First, StepType::Mid, StepType::Last].iter() {
            assert_eq!(StepType::try_from(st.code()), Ok(*st));
        }
        assert!(StepType::try_from(3).is_err());
    }
}

//! Trajectories and transitions.
use anyhow::Result;
use candle_core::Tensor;
use qlearn_core::{error::QlearnError, Nest, StepType};

/// One instant of an environment trajectory.
///
/// All tensors share the same outer dimensions, `[batch]` or `[batch, time]`.
#[derive(Clone, Debug)]
pub struct TimeStep {
    /// Step type codes, see [`StepType::code`].
    pub step_type: Tensor,

    /// Reward received on arrival at this step.
    pub reward: Tensor,

    /// Discount applied to the value of this step, in `[0, 1]`.
    pub discount: Tensor,

    /// Observation.
    pub observation: Nest<Tensor>,
}

impl TimeStep {
    /// A tensor of the same outer shape with `1` where the step is terminal.
    pub fn is_last(&self) -> Result<Tensor> {
        Ok(self.step_type.eq(StepType::Last.code() as u32)?)
    }

    /// Removes the axis `dim` of size one from every tensor.
    pub fn squeeze(&self, dim: usize) -> Result<Self> {
        Ok(Self {
            step_type: self.step_type.squeeze(dim)?,
            reward: self.reward.squeeze(dim)?,
            discount: self.discount.squeeze(dim)?,
            observation: self.observation.try_map(|t| t.squeeze(dim))?,
        })
    }
}

/// A batch of trajectories.
///
/// Every tensor is shaped `[batch, time, ...]`. The entry at time `t`
/// describes the step type and observation at `t`, the action taken there,
/// and the step type, reward and discount of the step that action led to.
/// In the last time index `reward` and `discount` describe a transition out
/// of the window and are not used for n-step returns.
#[derive(Clone, Debug)]
pub struct Trajectory {
    /// Step types of the observations.
    pub step_type: Tensor,

    /// Observations.
    pub observation: Nest<Tensor>,

    /// Actions taken, `[batch, time]` or `[batch, time, 1]`.
    pub action: Tensor,

    /// Additional outputs of the policy that took the actions.
    pub policy_info: Option<Nest<Tensor>>,

    /// Step types of the steps following the actions.
    pub next_step_type: Tensor,

    /// Rewards following the actions.
    pub reward: Tensor,

    /// Discounts following the actions.
    pub discount: Tensor,
}

impl Trajectory {
    /// Returns the window `[start, start + len)` of the time axis.
    pub fn slice_time(&self, start: usize, len: usize) -> Result<Self> {
        let narrow = |t: &Tensor| t.narrow(1, start, len);
        Ok(Self {
            step_type: narrow(&self.step_type)?,
            observation: self.observation.try_map(narrow)?,
            action: narrow(&self.action)?,
            policy_info: match &self.policy_info {
                Some(info) => Some(info.try_map(narrow)?),
                None => None,
            },
            next_step_type: narrow(&self.next_step_type)?,
            reward: narrow(&self.reward)?,
            discount: narrow(&self.discount)?,
        })
    }

    /// The length of the time axis.
    pub fn time_len(&self) -> Result<usize> {
        Ok(self.reward.dim(1)?)
    }

    /// Splits the trajectory into transitions between consecutive time indices.
    ///
    /// For a time axis of length `T`, the transitions have `T - 1` time
    /// indices. The rewards and discounts of the first time steps are unknown
    /// and set to zero. Fails with [`QlearnError::ShapeError`] if `T < 2`.
    pub fn to_transition(&self) -> Result<Transition> {
        let t = self.time_len()?;
        if t < 2 {
            return Err(QlearnError::ShapeError(format!(
                "a transition needs at least 2 time steps, got {}",
                t
            ))
            .into());
        }
        let head = self.slice_time(0, t - 1)?;
        let tail = self.slice_time(1, t - 1)?;

        let time_step = TimeStep {
            step_type: head.step_type,
            reward: head.reward.zeros_like()?,
            discount: head.discount.zeros_like()?,
            observation: head.observation,
        };
        let next_time_step = TimeStep {
            step_type: head.next_step_type,
            reward: head.reward,
            discount: head.discount,
            observation: tail.observation,
        };

        Ok(Transition {
            time_step,
            action: head.action,
            policy_info: head.policy_info,
            next_time_step,
        })
    }
}

/// A transition `(time_step, action, next_time_step)`.
#[derive(Clone, Debug)]
pub struct Transition {
    /// The step the action was taken at.
    pub time_step: TimeStep,

    /// The action.
    pub action: Tensor,

    /// Additional outputs of the policy that took the action.
    pub policy_info: Option<Nest<Tensor>>,

    /// The step the action led to.
    pub next_time_step: TimeStep,
}

impl Transition {
    /// Removes the time axis, which must have length one.
    pub fn squeeze_time(self) -> Result<Self> {
        Ok(Self {
            time_step: self.time_step.squeeze(1)?,
            action: self.action.squeeze(1)?,
            policy_info: match self.policy_info {
                Some(info) => Some(info.try_map(|t| t.squeeze(1))?),
                None => None,
            },
            next_time_step: self.next_time_step.squeeze(1)?,
        })
    }
}

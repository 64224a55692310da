//! Rules computing the value of next time steps.
use super::model::DqnModel;
use crate::{model::QNetwork, util::OutDim, TimeStep};
use anyhow::Result;
use candle_core::{Tensor, D};
use qlearn_core::error::QlearnError;
use serde::{de::DeserializeOwned, Serialize};

/// Computes the value of next time steps used for bootstrapping TD targets.
pub trait NextValueRule<Q>
where
    Q: QNetwork,
{
    /// Returns the value of each next time step, with the action axis removed.
    fn next_q_values(
        &self,
        qnet: &DqnModel<Q>,
        qnet_tgt: &DqnModel<Q>,
        next_time_step: &TimeStep,
    ) -> Result<Tensor>;
}

fn check_rank(values: &Tensor) -> Result<()> {
    match values.rank() {
        2 | 3 => Ok(()),
        r => Err(QlearnError::ShapeError(format!(
            "action values must be [batch, num_actions] or [batch, time, num_actions], but saw rank {}",
            r
        ))
        .into()),
    }
}

/// Maximum of the target network's action values (DQN).
#[derive(Clone, Copy, Debug, Default)]
pub struct VanillaNextValue;

impl VanillaNextValue {
    /// Takes the maximum over the last axis of the target values.
    pub fn select(target_values: &Tensor) -> Result<Tensor> {
        check_rank(target_values)?;
        Ok(target_values.max(D::Minus1)?)
    }
}

impl<Q> NextValueRule<Q> for VanillaNextValue
where
    Q: QNetwork,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    fn next_q_values(
        &self,
        _qnet: &DqnModel<Q>,
        qnet_tgt: &DqnModel<Q>,
        next_time_step: &TimeStep,
    ) -> Result<Tensor> {
        let target_values =
            qnet_tgt.forward(&next_time_step.observation, &next_time_step.step_type)?;
        Self::select(&target_values)
    }
}

/// Target network's value of the action the online network prefers (Double DQN).
#[derive(Clone, Copy, Debug, Default)]
pub struct DoubleNextValue;

impl DoubleNextValue {
    /// Picks from the target values the action with the highest online value.
    pub fn select(online_values: &Tensor, target_values: &Tensor) -> Result<Tensor> {
        check_rank(online_values)?;
        check_rank(target_values)?;
        let best = online_values.argmax_keepdim(D::Minus1)?;
        Ok(target_values
            .contiguous()?
            .gather(&best, D::Minus1)?
            .squeeze(D::Minus1)?)
    }
}

impl<Q> NextValueRule<Q> for DoubleNextValue
where
    Q: QNetwork,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    fn next_q_values(
        &self,
        qnet: &DqnModel<Q>,
        qnet_tgt: &DqnModel<Q>,
        next_time_step: &TimeStep,
    ) -> Result<Tensor> {
        let obs = &next_time_step.observation;
        let step_type = &next_time_step.step_type;
        let online_values = qnet.forward(obs, step_type)?.detach();
        let target_values = qnet_tgt.forward(obs, step_type)?;
        Self::select(&online_values, &target_values)
    }
}

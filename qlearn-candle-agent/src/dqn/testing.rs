//! Small Q-networks with hand-set weights for tests.
use super::DqnModel;
use crate::{model::QNetwork, util::OutDim};
use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use candle_nn::{Init, VarBuilder};
use qlearn_core::{ArraySpec, DataType, Nest};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct LinearQConfig {
    pub in_dim: usize,
    pub out_dim: i64,
    pub recurrent: bool,
    pub aux_loss: Option<f32>,
}

impl LinearQConfig {
    pub fn new(in_dim: usize) -> Self {
        Self {
            in_dim,
            out_dim: 0,
            recurrent: false,
            aux_loss: None,
        }
    }
}

impl OutDim for LinearQConfig {
    fn get_out_dim(&self) -> i64 {
        self.out_dim
    }

    fn set_out_dim(&mut self, v: i64) {
        self.out_dim = v;
    }
}

/// `q = obs W^T` without bias. With `recurrent`, it claims a recurrent state
/// and takes observations with a time axis.
pub struct LinearQ {
    weight: Tensor,
    input_spec: Nest<ArraySpec>,
    state_spec: Option<ArraySpec>,
    aux_loss: Option<f32>,
    device: Device,
}

impl QNetwork for LinearQ {
    type Config = LinearQConfig;

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        let weight = vb.get_with_hints(
            (config.out_dim as usize, config.in_dim),
            "q.weight",
            Init::Const(0.0),
        )?;
        Ok(Self {
            weight,
            input_spec: Nest::Leaf(ArraySpec::new(vec![config.in_dim], DataType::F32)),
            state_spec: match config.recurrent {
                true => Some(ArraySpec::new(vec![1], DataType::F32)),
                false => None,
            },
            aux_loss: config.aux_loss,
            device: vb.device().clone(),
        })
    }

    fn forward(
        &self,
        obs: &Nest<Tensor>,
        _step_type: &Tensor,
        state: Option<&Tensor>,
    ) -> Result<(Tensor, Option<Tensor>)> {
        let x = obs.as_leaf().ok_or_else(|| anyhow!("single observation expected"))?;
        let q = x.broadcast_matmul(&self.weight.t()?)?;
        let state = match self.state_spec {
            Some(_) => Some(match state {
                Some(s) => s.clone(),
                None => Tensor::zeros(x.dim(0)?, candle_core::DType::F32, &self.device)?,
            }),
            None => None,
        };
        Ok((q, state))
    }

    fn input_spec(&self) -> &Nest<ArraySpec> {
        &self.input_spec
    }

    fn state_spec(&self) -> Option<&ArraySpec> {
        self.state_spec.as_ref()
    }

    fn losses(&self) -> Result<Vec<Tensor>> {
        match self.aux_loss {
            None => Ok(vec![]),
            Some(v) => Ok(vec![
                Tensor::new(v, &self.device)?,
                Tensor::new(3.0 * v, &self.device)?,
            ]),
        }
    }
}

/// Overwrites the weight `[num_actions, in_dim]` of a [`LinearQ`] model.
pub fn set_weight(model: &DqnModel<LinearQ>, values: &[f32]) -> Result<()> {
    let data = model.get_varmap().data().lock().unwrap();
    let var = data.get("q.weight").unwrap();
    let t = Tensor::from_slice(values, var.dims(), &Device::Cpu)?;
    var.set(&t)?;
    Ok(())
}

pub fn weight(model: &DqnModel<LinearQ>) -> Result<Vec<f32>> {
    let data = model.get_varmap().data().lock().unwrap();
    Ok(data.get("q.weight").unwrap().flatten_all()?.to_vec1::<f32>()?)
}

use crate::util::OutDim;
use serde::{Deserialize, Serialize};

/// Configuration of [`Mlp`](super::Mlp), a Q-network on flat observations.
///
/// `out_dim` is the number of actions; [`Dqn`](crate::dqn::Dqn) overwrites it
/// from the action spec.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct MlpConfig {
    /// Size of the observation vector.
    pub(super) in_dim: i64,

    /// Widths of the hidden layers.
    pub(super) units: Vec<i64>,

    pub(super) out_dim: i64,

    /// Applies ReLU to the action values too. Usually `false`.
    pub(super) activation_out: bool,

    #[serde(default)]
    pub(super) l2_reg: Option<f64>,
}

impl MlpConfig {
    /// Hidden layers of `units` between `in_dim` observations and `out_dim` action values.
    pub fn new(in_dim: i64, units: Vec<i64>, out_dim: i64, activation_out: bool) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
            activation_out,
            l2_reg: None,
        }
    }

    /// Sets the coefficient of the L2 penalty on weights, exposed as an auxiliary loss.
    pub fn l2_reg(mut self, v: Option<f64>) -> Self {
        self.l2_reg = v;
        self
    }
}

impl OutDim for MlpConfig {
    fn get_out_dim(&self) -> i64 {
        self.out_dim
    }

    fn set_out_dim(&mut self, out_dim: i64) {
        self.out_dim = out_dim;
    }
}

//! Interface of Q-networks used in agents.
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::VarBuilder;
use qlearn_core::{ArraySpec, Nest};

/// Action-value function not owning its [`VarMap`] internally.
///
/// A Q-network maps a batch of observations and their step types to a vector
/// of action values per observation. Parameters are created through the given
/// [`VarBuilder`], so the owner of the [`VarMap`] decides whether two networks
/// share storage or not.
///
/// Feed-forward networks take observations shaped `[batch, ...]` and emit
/// `[batch, num_actions]`. Recurrent networks, those with a non-empty
/// [`QNetwork::state_spec`], take `[batch, time, ...]` and emit
/// `[batch, time, num_actions]`.
///
/// [`VarMap`]: candle_nn::VarMap
pub trait QNetwork {
    /// Configuration from which [`QNetwork`] is constructed.
    type Config;

    /// Builds [`QNetwork`] with [`VarBuilder`] and [`QNetwork::Config`].
    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Computes action values.
    ///
    /// `state` is the recurrent state to start from; `None` means the initial
    /// state. Returns the action values and the next recurrent state, which is
    /// `None` for feed-forward networks.
    fn forward(
        &self,
        obs: &Nest<Tensor>,
        step_type: &Tensor,
        state: Option<&Tensor>,
    ) -> Result<(Tensor, Option<Tensor>)>;

    /// Spec of a single observation, without batch and time dimensions.
    fn input_spec(&self) -> &Nest<ArraySpec>;

    /// Spec of the recurrent state, `None` for feed-forward networks.
    fn state_spec(&self) -> Option<&ArraySpec> {
        None
    }

    /// Scalar auxiliary losses of the network, such as weight regularization.
    fn losses(&self) -> Result<Vec<Tensor>> {
        Ok(vec![])
    }
}

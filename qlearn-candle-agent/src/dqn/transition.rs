//! Extraction of transitions from trajectories.
use crate::{Trajectory, Transition};
use anyhow::Result;
use qlearn_core::error::QlearnError;

/// Converts batches of trajectories into `(time_step, action, next_time_step)` triples.
///
/// * With a feed-forward network and `n_step_update == 1`, a trajectory of
///   two time steps becomes one transition without the time axis.
/// * With `n_step_update > 1`, the first two time steps give the time step
///   and the action, and the last two time steps give the next time step
///   used for bootstrapping. Steps in between only contribute rewards and
///   discounts to the n-step return.
/// * With a recurrent network, every pair of consecutive time steps is a
///   transition and the time axis is kept.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionExtractor {
    n_step_update: usize,
    recurrent: bool,
}

impl TransitionExtractor {
    /// Creates an extractor.
    ///
    /// Fails if `n_step_update` is zero, or larger than one for a recurrent network.
    pub fn new(n_step_update: usize, recurrent: bool) -> Result<Self, QlearnError> {
        if n_step_update == 0 {
            return Err(QlearnError::ConfigurationError(
                "n_step_update must be a positive integer".to_string(),
            ));
        }
        if recurrent && n_step_update != 1 {
            return Err(QlearnError::ConfigurationError(format!(
                "n_step_update = {} is not supported with recurrent networks, it must be 1",
                n_step_update
            )));
        }
        Ok(Self {
            n_step_update,
            recurrent,
        })
    }

    /// Number of steps accumulated into a return before bootstrapping.
    pub fn n_step_update(&self) -> usize {
        self.n_step_update
    }

    /// Extracts the transition used for Q-value lookups.
    pub fn extract(&self, experience: &Trajectory) -> Result<Transition> {
        if self.recurrent {
            return experience.to_transition();
        }

        let t = experience.time_len()?;
        if t != self.n_step_update + 1 {
            return Err(QlearnError::ShapeError(format!(
                "experience must have {} time steps with n_step_update = {}, got {}",
                self.n_step_update + 1,
                self.n_step_update,
                t
            ))
            .into());
        }

        if self.n_step_update == 1 {
            experience.to_transition()?.squeeze_time()
        } else {
            let first_two = experience.slice_time(0, 2)?.to_transition()?.squeeze_time()?;
            let last_two = experience.slice_time(t - 2, 2)?.to_transition()?.squeeze_time()?;
            Ok(Transition {
                time_step: first_two.time_step,
                action: first_two.action,
                policy_info: first_two.policy_info,
                next_time_step: last_two.next_time_step,
            })
        }
    }
}

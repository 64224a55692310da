//! Synchronization of the target network.
use crate::util::track;
use anyhow::Result;
use candle_nn::VarMap;
use log::trace;
use qlearn_core::{error::QlearnError, Periodically};

/// Keeps target parameters as a delayed, optionally smoothed copy of online parameters.
///
/// Each call of [`TargetUpdater::update`] counts one training step. Every
/// `period` steps the target parameters are blended as
/// `w_target = (1 - tau) * w_target + tau * w_online`.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetUpdater {
    tau: f64,
    period: Periodically,
}

impl TargetUpdater {
    /// Creates an updater.
    ///
    /// `tau` must be in `[0, 1]` and `period` must be positive.
    pub fn new(tau: f64, period: usize) -> Result<Self, QlearnError> {
        if !(0.0..=1.0).contains(&tau) {
            return Err(QlearnError::ConfigurationError(format!(
                "target_update_tau must be in [0, 1], but saw {}",
                tau
            )));
        }
        Ok(Self {
            tau,
            period: Periodically::new(period)?,
        })
    }

    /// Copies online parameters into the target parameters, ignoring `tau` and the period.
    pub fn initialize(&self, target: &VarMap, online: &VarMap) -> Result<()> {
        track(target, online, 1.0)
    }

    /// Counts a training step and blends parameters if the period has elapsed.
    ///
    /// Returns `true` if the target parameters were updated.
    pub fn update(&mut self, target: &VarMap, online: &VarMap) -> Result<bool> {
        if self.period.tick() {
            trace!("Update target parameters with tau = {}", self.tau);
            track(target, online, self.tau)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Blend factor.
    pub fn tau(&self) -> f64 {
        self.tau
    }

    /// Number of steps between updates.
    pub fn period(&self) -> usize {
        self.period.period()
    }
}

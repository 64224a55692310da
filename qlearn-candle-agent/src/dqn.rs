//! DQN agent.
mod base;
mod config;
mod explorer;
mod loss_info;
mod model;
mod next_value;
mod target;
mod td;
#[cfg(test)]
mod testing;
mod transition;
pub use base::Dqn;
pub use config::DqnConfig;
pub use explorer::{Boltzmann, DqnExplorer, EpsilonGreedy};
pub use loss_info::{DqnLossInfo, LossInfo};
pub use model::{check_matching_networks, shared_variables, DqnModel, DqnModelConfig};
pub use next_value::{DoubleNextValue, NextValueRule, VanillaNextValue};
pub use target::TargetUpdater;
pub use td::{compute_n_step_td_targets, compute_td_targets};
pub use transition::TransitionExtractor;

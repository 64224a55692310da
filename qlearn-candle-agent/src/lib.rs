//! DQN agents implemented with [candle](https://crates.io/crates/candle-core).
//!
//! The [`dqn::Dqn`] agent trains an online Q-network from batches of
//! [`Trajectory`] data with the TD loss of DQN or Double DQN, and keeps a
//! target network in sync with it.
pub mod dqn;
pub mod mlp;
pub mod model;
pub mod opt;
mod trajectory;
pub mod util;
use anyhow::Result;
use serde::{Deserialize, Serialize};
pub use trajectory::{TimeStep, Trajectory, Transition};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}

impl Device {
    /// Creates the corresponding [`candle_core::Device`].
    pub fn to_candle(&self) -> Result<candle_core::Device> {
        Ok(match self {
            Self::Cpu => candle_core::Device::Cpu,
            Self::Cuda(n) => candle_core::Device::new_cuda(*n)?,
        })
    }
}

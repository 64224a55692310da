//! Configuration of DQN agent.
use super::DqnModelConfig;
use crate::{opt::OptimizerConfig, util::{OutDim, TdErrorsLoss}, Device};
use anyhow::Result;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Dqn`](super::Dqn).
///
/// `Q` is the configuration type of the Q-network.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct DqnConfig<Q> {
    pub(super) model_config: DqnModelConfig<Q>,
    pub(super) n_step_update: usize,
    pub(super) target_update_tau: f64,
    pub(super) target_update_period: usize,
    pub(super) gamma: f64,
    pub(super) reward_scale_factor: f64,
    pub(super) gradient_clipping: Option<f64>,
    pub(super) epsilon_greedy: Option<f64>,
    pub(super) boltzmann_temperature: Option<f64>,
    pub(super) td_errors_loss: TdErrorsLoss,
    pub(super) double_dqn: bool,
    pub(super) summarize_grads_and_vars: bool,
    pub(super) debug_summaries: bool,
    pub(super) seed: u64,
    pub device: Device,
}

impl<Q> Default for DqnConfig<Q> {
    /// Constructs DQN builder with default parameters.
    fn default() -> Self {
        Self {
            model_config: Default::default(),
            n_step_update: 1,
            target_update_tau: 1.0,
            target_update_period: 1,
            gamma: 1.0,
            reward_scale_factor: 1.0,
            gradient_clipping: None,
            epsilon_greedy: Some(0.1),
            boltzmann_temperature: None,
            td_errors_loss: TdErrorsLoss::default(),
            double_dqn: false,
            summarize_grads_and_vars: false,
            debug_summaries: false,
            seed: 42,
            device: Device::default(),
        }
    }
}

impl<Q> DqnConfig<Q>
where
    Q: DeserializeOwned + Serialize + OutDim,
{
    /// Sets the configuration of the model.
    pub fn model_config(mut self, model_config: DqnModelConfig<Q>) -> Self {
        self.model_config = model_config;
        self
    }

    /// Sets the configuration of the Q-network.
    pub fn q_config(mut self, q_config: Q) -> Self {
        self.model_config = self.model_config.q_config(q_config);
        self
    }

    /// Sets the optimizer configuration.
    pub fn opt_config(mut self, opt_config: OptimizerConfig) -> Self {
        self.model_config = self.model_config.opt_config(opt_config);
        self
    }

    /// Number of steps accumulated into a return before bootstrapping.
    pub fn n_step_update(mut self, v: usize) -> Self {
        self.n_step_update = v;
        self
    }

    /// Blend factor of target updates, `1.0` for a hard copy.
    pub fn target_update_tau(mut self, v: f64) -> Self {
        self.target_update_tau = v;
        self
    }

    /// Number of training steps between target updates.
    pub fn target_update_period(mut self, v: usize) -> Self {
        self.target_update_period = v;
        self
    }

    /// Discount factor.
    pub fn gamma(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Scale of rewards.
    pub fn reward_scale_factor(mut self, v: f64) -> Self {
        self.reward_scale_factor = v;
        self
    }

    /// Upper bound of the norm of each gradient.
    pub fn gradient_clipping(mut self, v: Option<f64>) -> Self {
        self.gradient_clipping = v;
        self
    }

    /// Probability of random actions in the collect policy.
    pub fn epsilon_greedy(mut self, v: Option<f64>) -> Self {
        self.epsilon_greedy = v;
        self
    }

    /// Temperature of softmax action selection in the collect policy.
    pub fn boltzmann_temperature(mut self, v: Option<f64>) -> Self {
        self.boltzmann_temperature = v;
        self
    }

    /// Element-wise loss of TD errors.
    pub fn td_errors_loss(mut self, v: TdErrorsLoss) -> Self {
        self.td_errors_loss = v;
        self
    }

    /// Double DQN
    pub fn double_dqn(mut self, double_dqn: bool) -> Self {
        self.double_dqn = double_dqn;
        self
    }

    /// Adds statistics of parameters to training records.
    pub fn summarize_grads_and_vars(mut self, v: bool) -> Self {
        self.summarize_grads_and_vars = v;
        self
    }

    /// Logs training records at debug level.
    pub fn debug_summaries(mut self, v: bool) -> Self {
        self.debug_summaries = v;
        self
    }

    /// Seed of the random number generator of the collect policy.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Device.
    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Loads [`DqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of DQN agent from {:?}", path_);
        Ok(b)
    }

    /// Saves [`DqnConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of DQN agent into {:?}", path_);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mlp::MlpConfig;
    use tempdir::TempDir;

    #[test]
    fn test_serde_dqn_config() -> Result<()> {
        let config = DqnConfig::default()
            .q_config(MlpConfig::new(4, vec![64, 64], 2, false))
            .opt_config(OptimizerConfig::Sgd { lr: 0.01 })
            .n_step_update(3)
            .target_update_tau(0.005)
            .target_update_period(4)
            .gamma(0.99)
            .gradient_clipping(Some(10.0))
            .epsilon_greedy(None)
            .boltzmann_temperature(Some(0.5))
            .td_errors_loss(TdErrorsLoss::Squared)
            .double_dqn(true);

        let dir = TempDir::new("dqn_config")?;
        let path = dir.path().join("dqn_config.yaml");
        config.save(&path)?;
        let config_ = DqnConfig::<MlpConfig>::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_missing_fields_take_defaults() -> Result<()> {
        let yaml = "gamma: 0.9\ndouble_dqn: true\n";
        let config: DqnConfig<MlpConfig> = serde_yaml::from_str(yaml)?;
        assert_eq!(config.gamma, 0.9);
        assert!(config.double_dqn);
        assert_eq!(config.n_step_update, 1);
        assert_eq!(config.epsilon_greedy, Some(0.1));
        assert_eq!(config.td_errors_loss, TdErrorsLoss::Huber(1.0));
        Ok(())
    }
}

use crate::{
    model::QNetwork,
    opt::{Optimizer, OptimizerConfig},
    util::{sorted_vars, track, OutDim},
};
use anyhow::{Context, Result};
use candle_core::{backprop::GradStore, DType, Device, Tensor, Var};
use candle_nn::{VarBuilder, VarMap};
use itertools::Itertools;
use log::info;
use qlearn_core::{error::QlearnError, ArraySpec, Nest};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`DqnModel`].
pub struct DqnModelConfig<Q> {
    pub(super) q_config: Option<Q>,
    pub(super) opt_config: OptimizerConfig,
}

impl<Q> Default for DqnModelConfig<Q> {
    fn default() -> Self {
        Self {
            q_config: None,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl<Q> DqnModelConfig<Q>
where
    Q: DeserializeOwned + Serialize + OutDim,
{
    /// Sets configurations for action-value function.
    pub fn q_config(mut self, v: Q) -> Self {
        self.q_config = Some(v);
        self
    }

    /// Sets output dimension of the model.
    pub fn out_dim(mut self, v: i64) -> Self {
        match &mut self.q_config {
            None => {}
            Some(q_config) => q_config.set_out_dim(v),
        };
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Constructs [`DqnModelConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DqnModelConfig`] to as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// A Q-network together with the [`VarMap`] holding its parameters and an optimizer.
pub struct DqnModel<Q>
where
    Q: QNetwork,
{
    device: Device,
    varmap: VarMap,

    // Action-value function
    q: Q,

    // Optimizer
    opt_config: OptimizerConfig,
    q_config: Q::Config,
    opt: Optimizer,
}

impl<Q> DqnModel<Q>
where
    Q: QNetwork,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`DqnModel`] with its own parameters.
    pub fn build(config: DqnModelConfig<Q::Config>, device: Device) -> Result<Self> {
        Self::with_varmap(config, VarMap::new(), device)
    }

    /// Constructs [`DqnModel`] whose parameters are created in, or taken from, `varmap`.
    ///
    /// Parameters already in `varmap` are reused, so passing a clone of the
    /// [`VarMap`] of another model makes both models share storage.
    pub fn with_varmap(
        config: DqnModelConfig<Q::Config>,
        varmap: VarMap,
        device: Device,
    ) -> Result<Self> {
        let q_config = config.q_config.context("q_config is not set.")?;
        let opt_config = config.opt_config;
        let q = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            Q::build(vb, q_config.clone())?
        };
        let opt = opt_config.build(varmap.all_vars())?;

        Ok(Self {
            device,
            varmap,
            q,
            opt_config,
            q_config,
            opt,
        })
    }

    /// Constructs a model with the same configuration and a copy of the parameters.
    ///
    /// The copy does not share storage with `self`.
    pub fn copy(&self) -> Result<Self> {
        let config = DqnModelConfig {
            q_config: Some(self.q_config.clone()),
            opt_config: self.opt_config.clone(),
        };
        let model = Self::build(config, self.device.clone())?;
        track(&model.varmap, &self.varmap, 1.0)?;
        Ok(model)
    }

    /// Outputs the action values given observations, starting from the initial recurrent state.
    pub fn forward(&self, obs: &Nest<Tensor>, step_type: &Tensor) -> Result<Tensor> {
        Ok(self.forward_with_state(obs, step_type, None)?.0)
    }

    /// Outputs the action values and the next recurrent state.
    pub fn forward_with_state(
        &self,
        obs: &Nest<Tensor>,
        step_type: &Tensor,
        state: Option<&Tensor>,
    ) -> Result<(Tensor, Option<Tensor>)> {
        self.q.forward(obs, step_type, state)
    }

    /// Applies gradients to the parameters with the optimizer.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        self.opt.step(grads)
    }

    /// Parameters sorted by their names.
    pub fn vars(&self) -> Result<Vec<Var>> {
        Ok(sorted_vars(&self.varmap)?.into_iter().map(|(_, v)| v).collect())
    }

    pub fn get_varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// The underlying Q-network.
    pub fn network(&self) -> &Q {
        &self.q
    }

    pub fn q_config(&self) -> &Q::Config {
        &self.q_config
    }

    /// Spec of a single observation.
    pub fn input_spec(&self) -> &Nest<ArraySpec> {
        self.q.input_spec()
    }

    /// `true` if the Q-network carries a recurrent state.
    pub fn is_recurrent(&self) -> bool {
        self.q.state_spec().is_some()
    }

    /// Auxiliary losses of the Q-network.
    pub fn losses(&self) -> Result<Vec<Tensor>> {
        self.q.losses()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save dqnmodel to {:?}", path.as_ref());
        Ok(())
    }

    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load dqnmodel from {:?}", path.as_ref());
        Ok(())
    }
}

/// Returns names of the parameters of `b` whose storage is also used by `a`.
pub fn shared_variables<Q>(a: &DqnModel<Q>, b: &DqnModel<Q>) -> Result<Vec<String>>
where
    Q: QNetwork,
{
    let ids = sorted_vars(&a.varmap)?
        .into_iter()
        .map(|(_, v)| v.as_tensor().id())
        .collect::<HashSet<_>>();
    Ok(sorted_vars(&b.varmap)?
        .into_iter()
        .filter(|(_, v)| ids.contains(&v.as_tensor().id()))
        .map(|(k, _)| k)
        .collect())
}

/// Fails if the online and target networks are not interchangeable.
///
/// Their input specs must be equal, and their parameters, sorted by name,
/// must agree in count and pairwise in dtype and shape.
pub fn check_matching_networks<Q>(online: &DqnModel<Q>, target: &DqnModel<Q>) -> Result<()>
where
    Q: QNetwork,
{
    if online.q.input_spec() != target.q.input_spec() {
        return Err(QlearnError::ConfigurationError(format!(
            "input specs of the online and target networks do not match: {:?} vs {:?}",
            online.q.input_spec(),
            target.q.input_spec()
        ))
        .into());
    }

    let online_vars = sorted_vars(&online.varmap)?;
    let target_vars = sorted_vars(&target.varmap)?;
    if online_vars.len() != target_vars.len() {
        return Err(QlearnError::ConfigurationError(format!(
            "the online network has {} parameters but the target network has {}",
            online_vars.len(),
            target_vars.len()
        ))
        .into());
    }

    for ((k1, v1), (k2, v2)) in online_vars.iter().zip_eq(target_vars.iter()) {
        if v1.dtype() != v2.dtype() || v1.dims() != v2.dims() {
            return Err(QlearnError::ConfigurationError(format!(
                "parameters {} ({:?}, {:?}) and {} ({:?}, {:?}) of the online and target networks do not match",
                k1,
                v1.dtype(),
                v1.dims(),
                k2,
                v2.dtype(),
                v2.dims()
            ))
            .into());
        }
    }

    Ok(())
}

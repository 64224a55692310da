//! DQN agent implemented with candle.
use super::{
    config::DqnConfig,
    explorer::{greedy, DqnExplorer},
    loss_info::{DqnLossInfo, LossInfo},
    model::{check_matching_networks, shared_variables, DqnModel},
    next_value::{DoubleNextValue, NextValueRule, VanillaNextValue},
    target::TargetUpdater,
    td::{compute_n_step_td_targets, compute_td_targets},
    transition::TransitionExtractor,
};
use crate::{
    model::QNetwork,
    util::{clip_gradient_norms, index_with_actions, param_stats, ElementwiseLoss, OutDim},
    Trajectory,
};
use anyhow::Result;
use candle_core::{DType, Tensor, D};
use log::{debug, info, warn};
use qlearn_core::{
    error::QlearnError,
    record::{Record, RecordValue},
    validate_action_spec, BoundedArraySpec, Nest,
};
use rand::{rngs::SmallRng, SeedableRng};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::Path};

fn shape_error(msg: String) -> anyhow::Error {
    QlearnError::ShapeError(msg).into()
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// DQN agent implemented with candle.
///
/// The agent owns an online Q-network and a target Q-network of the same
/// architecture with separate parameters. A training step looks like this:
///
/// ```mermaid
/// graph LR
///     A[Trajectory] --> B[TransitionExtractor]
///     B -->|time_step, action| C[online Q-network]
///     B -->|next_time_step| D[NextValueRule]
///     D --> E[TD targets]
///     C --> F[masked, weighted TD loss]
///     E --> F
///     F --> G[optimizer step]
///     G --> H[TargetUpdater]
/// ```
///
/// The next-value rule is the maximum of the target network's action values
/// (DQN) or the target network's value of the online network's best action
/// (Double DQN).
pub struct Dqn<Q>
where
    Q: QNetwork,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    qnet: DqnModel<Q>,
    qnet_tgt: DqnModel<Q>,
    next_value_rule: Box<dyn NextValueRule<Q>>,
    td_errors_loss_fn: Box<dyn ElementwiseLoss>,
    target_updater: TargetUpdater,
    transition_extractor: TransitionExtractor,
    action_spec: Nest<BoundedArraySpec>,
    num_actions: usize,
    multi_dim_actions: bool,
    n_step_update: usize,
    gamma: f64,
    reward_scale_factor: f64,
    gradient_clipping: Option<f64>,
    explorer: Option<DqnExplorer>,
    train: bool,
    train_step_counter: usize,
    summarize_grads_and_vars: bool,
    debug_summaries: bool,
    rng: SmallRng,
}

impl<Q> Dqn<Q>
where
    Q: QNetwork,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs DQN agent.
    ///
    /// The output dimension of the Q-network is set to the number of actions,
    /// and the target network is a copy of the online network.
    pub fn build(
        config: DqnConfig<Q::Config>,
        action_spec: Nest<BoundedArraySpec>,
    ) -> Result<Self> {
        let actions = validate_action_spec(&action_spec)?;
        let device = config.device.to_candle()?;
        let model_config = config
            .model_config
            .clone()
            .out_dim(actions.num_actions as i64);
        let qnet = DqnModel::build(model_config, device)?;
        let qnet_tgt = qnet.copy()?;
        Self::from_networks(config, action_spec, qnet, qnet_tgt, false)
    }

    /// Constructs DQN agent from pre-built online and target networks.
    ///
    /// The target network is overwritten by the online network's parameters.
    /// Parameters shared between the two networks are reported with a
    /// warning instead of an error.
    pub fn build_with_target(
        config: DqnConfig<Q::Config>,
        action_spec: Nest<BoundedArraySpec>,
        qnet: DqnModel<Q>,
        qnet_tgt: DqnModel<Q>,
    ) -> Result<Self> {
        Self::from_networks(config, action_spec, qnet, qnet_tgt, true)
    }

    pub(crate) fn from_networks(
        config: DqnConfig<Q::Config>,
        action_spec: Nest<BoundedArraySpec>,
        qnet: DqnModel<Q>,
        qnet_tgt: DqnModel<Q>,
        target_provided: bool,
    ) -> Result<Self> {
        let actions = validate_action_spec(&action_spec)?;
        let explorer =
            DqnExplorer::from_settings(config.epsilon_greedy, config.boltzmann_temperature)?;

        let out_dim = qnet.q_config().get_out_dim();
        if out_dim != actions.num_actions as i64 {
            return Err(QlearnError::ConfigurationError(format!(
                "the Q-network outputs {} values but there are {} actions",
                out_dim, actions.num_actions
            ))
            .into());
        }

        let shared = shared_variables(&qnet, &qnet_tgt)?;
        if !shared.is_empty() {
            let msg = format!(
                "the target network shares variables with the online network: {:?}",
                shared
            );
            if target_provided {
                warn!("{}", msg);
            } else {
                return Err(QlearnError::ConfigurationError(msg).into());
            }
        }
        check_matching_networks(&qnet, &qnet_tgt)?;
        if qnet.vars()?.is_empty() {
            return Err(
                QlearnError::ConfigurationError("the Q-network has no variables".to_string())
                    .into(),
            );
        }

        let transition_extractor =
            TransitionExtractor::new(config.n_step_update, qnet.is_recurrent())?;
        let target_updater =
            TargetUpdater::new(config.target_update_tau, config.target_update_period)?;
        target_updater.initialize(qnet_tgt.get_varmap(), qnet.get_varmap())?;

        let next_value_rule: Box<dyn NextValueRule<Q>> = match config.double_dqn {
            true => Box::new(DoubleNextValue),
            false => Box::new(VanillaNextValue),
        };

        info!(
            "Build {} agent with {} actions, n_step_update = {}, tau = {}, period = {}",
            if config.double_dqn { "Double DQN" } else { "DQN" },
            actions.num_actions,
            config.n_step_update,
            config.target_update_tau,
            config.target_update_period
        );

        Ok(Self {
            qnet,
            qnet_tgt,
            next_value_rule,
            td_errors_loss_fn: Box::new(config.td_errors_loss),
            target_updater,
            transition_extractor,
            action_spec,
            num_actions: actions.num_actions,
            multi_dim_actions: actions.multi_dim_actions,
            n_step_update: config.n_step_update,
            gamma: config.gamma,
            reward_scale_factor: config.reward_scale_factor,
            gradient_clipping: config.gradient_clipping,
            explorer,
            train: false,
            train_step_counter: 0,
            summarize_grads_and_vars: config.summarize_grads_and_vars,
            debug_summaries: config.debug_summaries,
            rng: SmallRng::seed_from_u64(config.seed),
        })
    }

    /// Replaces the element-wise loss of TD errors.
    pub fn with_td_errors_loss_fn(mut self, f: impl ElementwiseLoss + 'static) -> Self {
        self.td_errors_loss_fn = Box::new(f);
        self
    }

    /// Replaces the rule computing next values.
    pub fn with_next_value_rule(mut self, rule: impl NextValueRule<Q> + 'static) -> Self {
        self.next_value_rule = Box::new(rule);
        self
    }

    /// Length of the time axis of trajectories given to [`Dqn::loss`] and [`Dqn::train`].
    ///
    /// `n_step_update + 1` for feed-forward networks, `None` (any length of
    /// at least two) for recurrent networks.
    pub fn train_sequence_length(&self) -> Option<usize> {
        match self.qnet.is_recurrent() {
            true => None,
            false => Some(self.n_step_update + 1),
        }
    }

    fn check_trajectory_dimensions(&self, experience: &Trajectory) -> Result<()> {
        let outer = experience.reward.dims().to_vec();
        if outer.len() != 2 {
            return Err(shape_error(format!(
                "trajectories must have outer dimensions [batch, time], but reward has shape {:?}",
                outer
            )));
        }

        for (name, t) in [
            ("step_type", &experience.step_type),
            ("next_step_type", &experience.next_step_type),
            ("discount", &experience.discount),
        ]
        .iter()
        {
            if t.dims() != &outer[..] {
                return Err(shape_error(format!(
                    "{} has shape {:?}, but the outer dimensions are {:?}",
                    name,
                    t.dims(),
                    outer
                )));
            }
        }

        let mut action_dims = outer.clone();
        if self.multi_dim_actions {
            action_dims.push(1);
        }
        if experience.action.dims() != &action_dims[..] {
            return Err(shape_error(format!(
                "action has shape {:?}, but {:?} is expected",
                experience.action.dims(),
                action_dims
            )));
        }

        let input_spec = self.qnet.input_spec();
        if !experience.observation.same_structure(input_spec) {
            return Err(shape_error(
                "observation does not match the structure of the input spec".to_string(),
            ));
        }
        for (t, spec) in experience
            .observation
            .flatten()
            .iter()
            .zip(input_spec.flatten().iter())
        {
            let mut dims = outer.clone();
            dims.extend(spec.shape.iter());
            if t.dims() != &dims[..] {
                return Err(shape_error(format!(
                    "observation has shape {:?}, but {:?} is expected",
                    t.dims(),
                    dims
                )));
            }
        }

        let time_len = outer[1];
        match self.train_sequence_length() {
            Some(len) if time_len != len => Err(shape_error(format!(
                "trajectories must have {} time steps, but saw {}",
                len, time_len
            ))),
            None if time_len < 2 => Err(shape_error(format!(
                "trajectories must have at least 2 time steps, but saw {}",
                time_len
            ))),
            _ => Ok(()),
        }
    }

    fn apply_weights(td_loss: &Tensor, weights: &Tensor) -> Result<Tensor> {
        let batch_size = td_loss.dim(0)?;
        let weights = weights.to_dtype(td_loss.dtype())?;
        match weights.dims() {
            [] => Ok(td_loss.broadcast_mul(&weights)?),
            [n] if *n == batch_size => Ok((td_loss * &weights)?),
            dims => Err(shape_error(format!(
                "weights must be a scalar or have shape [{}], but saw {:?}",
                batch_size, dims
            ))),
        }
    }

    /// Computes the TD loss of a batch of trajectories.
    ///
    /// `weights` is a scalar or one weight per batch element. Tensors of
    /// `experience` must be on the device of the agent.
    pub fn loss(&self, experience: &Trajectory, weights: Option<&Tensor>) -> Result<LossInfo> {
        self.check_trajectory_dimensions(experience)?;
        let transition = self.transition_extractor.extract(experience)?;
        let time_step = &transition.time_step;
        let next_time_step = &transition.next_time_step;

        let q_values = {
            let q = self
                .qnet
                .forward(&time_step.observation, &time_step.step_type)?;
            index_with_actions(&q, &transition.action, self.multi_dim_actions)?
        };
        let next_q_values =
            self.next_value_rule
                .next_q_values(&self.qnet, &self.qnet_tgt, next_time_step)?;

        let td_targets = match self.n_step_update {
            1 => compute_td_targets(
                &next_q_values,
                &next_time_step.reward,
                &next_time_step.discount,
                self.gamma,
                self.reward_scale_factor,
            )?,
            _ => {
                // The last reward and discount lie outside of the window.
                let t = experience.time_len()?;
                compute_n_step_td_targets(
                    &next_q_values,
                    &experience.reward.narrow(1, 0, t - 1)?,
                    &experience.discount.narrow(1, 0, t - 1)?,
                    self.gamma,
                    self.reward_scale_factor,
                )?
            }
        };

        let valid_mask = time_step
            .is_last()?
            .to_dtype(q_values.dtype())?
            .affine(-1.0, 1.0)?;
        let td_error = (&valid_mask * (&td_targets - &q_values)?)?;
        let mut td_loss =
            (&valid_mask * self.td_errors_loss_fn.loss(&td_targets, &q_values)?)?;
        if td_loss.rank() >= 2 {
            td_loss = td_loss.sum(1)?;
        }
        if let Some(weights) = weights {
            td_loss = Self::apply_weights(&td_loss, weights)?;
        }

        let mut loss = td_loss.mean_all()?;
        let aux_losses = self.qnet.losses()?;
        if !aux_losses.is_empty() {
            let aux_losses = aux_losses
                .iter()
                .map(|l| -> candle_core::Result<Tensor> { l.to_dtype(loss.dtype())?.reshape(()) })
                .collect::<candle_core::Result<Vec<_>>>()?;
            loss = (loss + Tensor::stack(&aux_losses, 0)?.mean_all()?)?;
        }

        let value = loss.to_dtype(DType::F64)?.to_scalar::<f64>()?;
        if !value.is_finite() {
            return Err(QlearnError::NumericError(format!("loss is not finite: {}", value)).into());
        }

        Ok(LossInfo {
            loss,
            extra: DqnLossInfo {
                td_loss,
                td_error,
                q_values,
            },
        })
    }

    /// Performs a training step and returns its record.
    ///
    /// The gradient of the loss is optionally clipped and applied to the
    /// online network, then the target network is updated if its period has
    /// elapsed. If the loss cannot be computed, parameters are left as they are.
    pub fn train(&mut self, experience: &Trajectory, weights: Option<&Tensor>) -> Result<Record> {
        let loss_info = self.loss(experience, weights)?;

        let mut grads = loss_info.loss.backward()?;
        let grad_norms = match self.gradient_clipping {
            Some(max_norm) => Some(clip_gradient_norms(&mut grads, &self.qnet.vars()?, max_norm)?),
            None => None,
        };
        self.qnet.step(&grads)?;
        self.train_step_counter += 1;

        let target_updated = self
            .target_updater
            .update(self.qnet_tgt.get_varmap(), self.qnet.get_varmap())?;

        let mut record = loss_info.record()?;
        record.insert(
            "train_step",
            RecordValue::Scalar(self.train_step_counter as f32),
        );
        record.insert(
            "target_updated",
            RecordValue::Scalar(if target_updated { 1.0 } else { 0.0 }),
        );
        if self.summarize_grads_and_vars {
            record.merge_inplace(param_stats(self.qnet.get_varmap())?);
            if let Some(norms) = grad_norms {
                record.insert("grad_norms", RecordValue::Array1(norms));
            }
        }
        if self.debug_summaries {
            debug!("Train step {}: {:?}", self.train_step_counter, record);
        }

        Ok(record)
    }

    /// Takes actions for a batch of observations.
    ///
    /// In training mode actions come from the collect explorer, if any, and
    /// are greedy otherwise. For recurrent networks the action values of the
    /// last time step are used.
    pub fn sample(&mut self, obs: &Nest<Tensor>, step_type: &Tensor) -> Result<Tensor> {
        let q = self.qnet.forward(obs, step_type)?;
        let q = match q.rank() {
            3 => match q.dim(1)? {
                0 => return Err(shape_error("observations have an empty time axis".to_string())),
                t => q.narrow(1, t - 1, 1)?.squeeze(1)?,
            },
            _ => q,
        };
        let a = match (&self.explorer, self.train) {
            (Some(explorer), true) => explorer.action(&q, &mut self.rng)?,
            _ => greedy(&q)?,
        };
        match self.multi_dim_actions {
            true => Ok(a.unsqueeze(D::Minus1)?),
            false => Ok(a),
        }
    }

    /// Sets the agent in training mode.
    pub fn train_mode(&mut self) {
        self.train = true;
    }

    /// Sets the agent in evaluation mode.
    pub fn eval_mode(&mut self) {
        self.train = false;
    }

    pub fn is_train(&self) -> bool {
        self.train
    }

    /// The online network.
    pub fn qnet(&self) -> &DqnModel<Q> {
        &self.qnet
    }

    /// The target network.
    pub fn qnet_tgt(&self) -> &DqnModel<Q> {
        &self.qnet_tgt
    }

    pub fn action_spec(&self) -> &Nest<BoundedArraySpec> {
        &self.action_spec
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    /// Number of training steps done so far.
    pub fn train_step_counter(&self) -> usize {
        self.train_step_counter
    }

    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        fs::create_dir_all(&path)?;
        self.qnet.save(&path.as_ref().join("qnet.pt").as_path())?;
        self.qnet_tgt
            .save(&path.as_ref().join("qnet_tgt.pt").as_path())?;
        Ok(())
    }

    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.qnet.load(&path.as_ref().join("qnet.pt").as_path())?;
        self.qnet_tgt
            .load(&path.as_ref().join("qnet_tgt.pt").as_path())?;
        Ok(())
    }
}

//! Exploration strategies of DQN.
use anyhow::{anyhow, Result};
use candle_core::{shape::D, DType, Tensor};
use candle_nn::ops::softmax;
use qlearn_core::error::QlearnError;
use rand::{distributions::WeightedIndex, Rng};
use serde::{Deserialize, Serialize};

/// Explorers for DQN.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum DqnExplorer {
    /// Boltzmann (softmax) action selection.
    Boltzmann(Boltzmann),

    /// Epsilon-greedy action selection.
    EpsilonGreedy(EpsilonGreedy),
}

impl DqnExplorer {
    /// Constructs the explorer of a collect policy from agent settings.
    ///
    /// Returns `None` when neither setting is given, meaning greedy collection.
    pub fn from_settings(
        epsilon_greedy: Option<f64>,
        boltzmann_temperature: Option<f64>,
    ) -> Result<Option<Self>, QlearnError> {
        match (epsilon_greedy, boltzmann_temperature) {
            (Some(_), Some(_)) => Err(QlearnError::ConfigurationError(
                "epsilon_greedy and boltzmann_temperature cannot be set at the same time"
                    .to_string(),
            )),
            (Some(eps), None) => Ok(Some(Self::EpsilonGreedy(EpsilonGreedy::new(eps)?))),
            (None, Some(t)) => Ok(Some(Self::Boltzmann(Boltzmann::new(t)?))),
            (None, None) => Ok(None),
        }
    }

    /// Takes actions based on action values `[batch, num_actions]`, returns i64 tensor `[batch]`.
    pub fn action(&self, a: &Tensor, rng: &mut impl Rng) -> Result<Tensor> {
        match self {
            Self::Boltzmann(b) => b.action(a, rng),
            Self::EpsilonGreedy(e) => e.action(a, rng),
        }
    }
}

/// Greedy actions, returns i64 tensor.
pub fn greedy(a: &Tensor) -> Result<Tensor> {
    Ok(a.argmax(D::Minus1)?.to_dtype(DType::I64)?)
}

/// Softmax explorer for DQN.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct Boltzmann {
    /// Temperature dividing the action values before the softmax.
    pub temperature: f64,
}

impl Boltzmann {
    /// Constructs softmax explorer.
    pub fn new(temperature: f64) -> Result<Self, QlearnError> {
        if !(temperature > 0.0) {
            return Err(QlearnError::ConfigurationError(format!(
                "boltzmann_temperature must be positive, but saw {}",
                temperature
            )));
        }
        Ok(Self { temperature })
    }

    /// Samples actions from `softmax(a / temperature)`.
    pub fn action(&self, a: &Tensor, rng: &mut impl Rng) -> Result<Tensor> {
        let device = a.device();
        let probs = softmax(&(a / self.temperature)?, D::Minus1)?
            .to_dtype(DType::F32)?
            .to_vec2::<f32>()?;
        let n_samples = probs.len();
        let data = probs
            .into_iter()
            .map(|p| -> Result<i64> {
                let dist = WeightedIndex::new(&p).map_err(|e| anyhow!("{}", e))?;
                Ok(rng.sample(dist) as i64)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Tensor::from_vec(data, &[n_samples], device)?)
    }
}

/// Epsilon-greedy explorer for DQN with a constant epsilon.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    /// Probability of taking a uniformly random action.
    pub epsilon: f64,
}

impl EpsilonGreedy {
    /// Constructs epsilon-greedy explorer.
    pub fn new(epsilon: f64) -> Result<Self, QlearnError> {
        if !(0.0..=1.0).contains(&epsilon) {
            return Err(QlearnError::ConfigurationError(format!(
                "epsilon_greedy must be in [0, 1], but saw {}",
                epsilon
            )));
        }
        Ok(Self { epsilon })
    }

    /// Takes a random action with probability epsilon for each sample,
    /// the greedy action otherwise.
    pub fn action(&self, a: &Tensor, rng: &mut impl Rng) -> Result<Tensor> {
        let n_actions = a.dim(D::Minus1)? as i64;
        let best: Vec<i64> = greedy(a)?.to_vec1()?;
        let n_samples = best.len();
        let data = best
            .into_iter()
            .map(|b| match rng.gen::<f64>() < self.epsilon {
                true => rng.gen_range(0..n_actions),
                false => b,
            })
            .collect::<Vec<_>>();
        Ok(Tensor::from_vec(data, &[n_samples], a.device())?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::Device;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_settings() {
        assert!(matches!(
            DqnExplorer::from_settings(Some(0.1), Some(1.0)),
            Err(QlearnError::ConfigurationError(_))
        ));
        assert!(matches!(
            DqnExplorer::from_settings(Some(1.5), None),
            Err(QlearnError::ConfigurationError(_))
        ));
        assert!(matches!(
            DqnExplorer::from_settings(None, Some(0.0)),
            Err(QlearnError::ConfigurationError(_))
        ));
        assert_eq!(DqnExplorer::from_settings(None, None), Ok(None));
    }

    #[test]
    fn test_epsilon_greedy() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);
        let q = Tensor::from_slice(&[0f32, 1.0, 0.0, 5.0, 0.0, 0.0], (2, 3), &Device::Cpu)?;

        let greedy = EpsilonGreedy::new(0.0)?.action(&q, &mut rng)?;
        assert_eq!(greedy.to_vec1::<i64>()?, vec![1, 0]);

        for _ in 0..10 {
            let a = EpsilonGreedy::new(1.0)?.action(&q, &mut rng)?.to_vec1::<i64>()?;
            assert!(a.iter().all(|&a| (0..3).contains(&a)));
        }
        Ok(())
    }

    #[test]
    fn test_boltzmann() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);
        // Low temperature concentrates the distribution on the best action.
        let q = Tensor::from_slice(&[0f32, 1.0, 0.0], (1, 3), &Device::Cpu)?;
        let explorer = Boltzmann::new(0.01)?;
        for _ in 0..10 {
            assert_eq!(explorer.action(&q, &mut rng)?.to_vec1::<i64>()?, vec![1]);
        }
        Ok(())
    }
}

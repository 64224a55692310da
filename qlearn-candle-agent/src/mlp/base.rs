use super::MlpConfig;
use crate::model::QNetwork;
use anyhow::{anyhow, Result};
use candle_core::{Device, Module, Tensor};
use candle_nn::{linear, Linear, VarBuilder};
use qlearn_core::{ArraySpec, DataType, Nest};

/// Returns vector of linear modules from [`MlpConfig`].
fn create_linear_layers(prefix: &str, vs: VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let mut dims = vec![config.in_dim];
    dims.extend(config.units.iter().copied());
    dims.push(config.out_dim);
    let vs = vs.pp(prefix);

    dims.windows(2)
        .enumerate()
        .map(|(i, w)| -> Result<Linear> {
            Ok(linear(w[0] as _, w[1] as _, vs.pp(format!("ln{}", i)))?)
        })
        .collect()
}

/// Multilayer perceptron with ReLU activation function.
///
/// As a [`QNetwork`] it takes a single observation tensor shaped
/// `[batch, in_dim]` and emits `[batch, out_dim]` action values.
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    layers: Vec<Linear>,
    input_spec: Nest<ArraySpec>,
}

impl Mlp {
    fn mlp_forward(&self, xs: &Tensor) -> Result<Tensor> {
        let n_layers = self.layers.len();
        let mut xs = xs.to_device(&self.device)?;

        for (i, layer) in self.layers.iter().enumerate() {
            xs = layer.forward(&xs)?;
            if i < n_layers - 1 || self.config.activation_out {
                xs = xs.relu()?;
            }
        }

        Ok(xs)
    }
}

impl QNetwork for Mlp {
    type Config = MlpConfig;

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vs.device().clone();
        let layers = create_linear_layers("mlp", vs, &config)?;
        let input_spec = Nest::Leaf(ArraySpec::new(vec![config.in_dim as _], DataType::F32));

        Ok(Self {
            config,
            device,
            layers,
            input_spec,
        })
    }

    fn forward(
        &self,
        obs: &Nest<Tensor>,
        _step_type: &Tensor,
        _state: Option<&Tensor>,
    ) -> Result<(Tensor, Option<Tensor>)> {
        let xs = obs
            .as_leaf()
            .ok_or_else(|| anyhow!("Mlp takes a single observation tensor"))?;
        Ok((self.mlp_forward(xs)?, None))
    }

    fn input_spec(&self) -> &Nest<ArraySpec> {
        &self.input_spec
    }

    fn losses(&self) -> Result<Vec<Tensor>> {
        match self.config.l2_reg {
            None => Ok(vec![]),
            Some(c) => {
                let mut penalty = Tensor::new(0f32, &self.device)?;
                for layer in self.layers.iter() {
                    penalty = (penalty + layer.weight().sqr()?.sum_all()?)?;
                }
                Ok(vec![(penalty * c)?])
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::DType;
    use candle_nn::VarMap;

    #[test]
    fn test_mlp() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = MlpConfig::new(4, vec![8, 8], 3, false).l2_reg(Some(0.01));
        let mlp = Mlp::build(vb, config)?;
        assert_eq!(varmap.all_vars().len(), 6);
        assert_eq!(mlp.input_spec().as_leaf().unwrap().shape, vec![4]);

        let obs = Nest::Leaf(Tensor::zeros((5, 4), DType::F32, &Device::Cpu)?);
        let step_type = Tensor::zeros(5, DType::U8, &Device::Cpu)?;
        let (q, state) = mlp.forward(&obs, &step_type, None)?;
        assert_eq!(q.dims(), &[5, 3]);
        assert!(state.is_none());

        let losses = mlp.losses()?;
        assert_eq!(losses.len(), 1);
        assert!(losses[0].to_scalar::<f32>()? > 0.0);
        Ok(())
    }

    #[test]
    fn test_mlp_rejects_nested_observations() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let mlp = Mlp::build(vb, MlpConfig::new(2, vec![], 2, false))?;
        let x = Tensor::zeros((1, 2), DType::F32, &Device::Cpu)?;
        let obs = Nest::Seq(vec![Nest::Leaf(x.clone()), Nest::Leaf(x)]);
        let step_type = Tensor::zeros(1, DType::U8, &Device::Cpu)?;
        assert!(mlp.forward(&obs, &step_type, None).is_err());
        Ok(())
    }
}

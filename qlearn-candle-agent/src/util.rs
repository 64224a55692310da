//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::{backprop::GradStore, DType, Tensor, Var, D};
use candle_nn::VarMap;
use log::trace;
use qlearn_core::record::{Record, RecordValue};
mod td_loss;
pub use td_loss::{element_wise_huber_loss, element_wise_squared_loss, ElementwiseLoss, TdErrorsLoss};

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
///
/// With `tau == 1.0` the values of `src` are copied as they are. Variables
/// present in both maps, or both maps being the same [`VarMap`], are left as
/// they are.
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    if std::ptr::eq(dest.data(), src.data()) {
        return Ok(());
    }

    trace!("dest");
    let dest = dest
        .data()
        .lock()
        .map_err(|_| anyhow!("destination variables are poisoned"))?;
    trace!("src");
    let src = src
        .data()
        .lock()
        .map_err(|_| anyhow!("source variables are poisoned"))?;

    for (k_dest, v_dest) in dest.iter() {
        let v_src = src
            .get(k_dest)
            .ok_or_else(|| anyhow!("variable {} is missing in the source", k_dest))?;
        if v_dest.as_tensor().id() == v_src.as_tensor().id() {
            continue;
        }
        let t_src = v_src.as_tensor();
        if tau == 1.0 {
            v_dest.set(t_src)?;
        } else {
            let t_dest = ((tau * t_src)? + ((1.0 - tau) * v_dest.as_tensor())?)?;
            v_dest.set(&t_dest)?;
        }
    }

    Ok(())
}

/// Returns variables of a [`VarMap`] sorted by their names.
pub fn sorted_vars(varmap: &VarMap) -> Result<Vec<(String, Var)>> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| anyhow!("variables are poisoned"))?;
    let mut vars = data
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect::<Vec<_>>();
    vars.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(vars)
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> i64;

    /// Sets the  output dimension.
    fn set_out_dim(&mut self, v: i64);
}

/// Picks the value of the taken action from a vector of action values.
///
/// `values` is `[batch, num_actions]` or `[batch, time, num_actions]` and
/// `actions` has the same outer dimensions. If `multi_dim_actions` is `true`,
/// `actions` carries a trailing unit axis, which is removed first.
pub fn index_with_actions(values: &Tensor, actions: &Tensor, multi_dim_actions: bool) -> Result<Tensor> {
    let actions = match multi_dim_actions {
        true => actions.squeeze(D::Minus1)?,
        false => actions.clone(),
    };
    let ixs = actions
        .to_dtype(DType::U32)?
        .unsqueeze(D::Minus1)?
        .contiguous()?;
    Ok(values
        .contiguous()?
        .gather(&ixs, D::Minus1)?
        .squeeze(D::Minus1)?)
}

/// Rescales every gradient whose L2 norm exceeds `max_norm` down to `max_norm`.
///
/// Returns the norms of the gradients before clipping, in the order of `vars`.
/// Variables without a gradient are skipped.
pub fn clip_gradient_norms(grads: &mut GradStore, vars: &[Var], max_norm: f64) -> Result<Vec<f32>> {
    let mut norms = Vec::with_capacity(vars.len());
    for var in vars.iter() {
        let grad = match grads.get(var.as_tensor()) {
            Some(grad) => grad.clone(),
            None => continue,
        };
        let norm = grad
            .to_dtype(DType::F32)?
            .sqr()?
            .sum_all()?
            .sqrt()?
            .to_scalar::<f32>()?;
        norms.push(norm);
        if norm as f64 > max_norm {
            let clipped = (grad * (max_norm / norm as f64))?;
            grads.insert(var.as_tensor(), clipped);
        }
    }
    Ok(norms)
}

/// Returns the standard deviation of a tensor.
pub fn std(t: &Tensor) -> Result<f32> {
    let t = t.to_dtype(DType::F32)?;
    Ok(t.broadcast_sub(&t.mean_all()?)?
        .sqr()?
        .mean_all()?
        .sqrt()?
        .to_scalar::<f32>()?)
}

/// Returns the mean and standard deviation of the parameters.
pub fn param_stats(varmap: &VarMap) -> Result<Record> {
    let mut record = Record::empty();

    for (k, v) in sorted_vars(varmap)?.iter() {
        let m: f32 = v.to_dtype(DType::F32)?.mean_all()?.to_scalar()?;
        record.insert(format!("{}_mean", k), RecordValue::Scalar(m));
        record.insert(format!("{}_std", k), RecordValue::Scalar(std(v.as_tensor())?));
    }

    Ok(record)
}

/// Mean of a tensor as `f32`.
pub(crate) fn mean_f32(t: &Tensor) -> Result<f32> {
    Ok(t.to_dtype(DType::F32)?.mean_all()?.to_scalar::<f32>()?)
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::Device;
    use candle_nn::Init;

    fn varmap_with(values: &[f32]) -> Result<VarMap> {
        let vm = VarMap::new();
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        vm.get((values.len(),), "var1", init, DType::F32, &Device::Cpu)?;
        let t = Tensor::from_slice(values, (values.len(),), &Device::Cpu)?;
        vm.data().lock().unwrap().get("var1").unwrap().set(&t)?;
        Ok(vm)
    }

    fn values(vm: &VarMap) -> Vec<f32> {
        vm.data()
            .lock()
            .unwrap()
            .get("var1")
            .unwrap()
            .as_tensor()
            .to_vec1()
            .unwrap()
    }

    #[test]
    fn test_track() -> Result<()> {
        let vm_src = varmap_with(&[1.0, 2.0, 3.0])?;
        let vm_dest = varmap_with(&[4.0, 5.0, 6.0])?;
        track(&vm_dest, &vm_src, 0.5)?;
        assert_eq!(values(&vm_dest), vec![2.5, 3.5, 4.5]);

        track(&vm_dest, &vm_src, 1.0)?;
        assert_eq!(values(&vm_dest), vec![1.0, 2.0, 3.0]);

        // Storage is copied, not shared.
        vm_src
            .data()
            .lock()
            .unwrap()
            .get("var1")
            .unwrap()
            .set(&Tensor::from_slice(&[0f32, 0., 0.], (3,), &Device::Cpu)?)?;
        assert_eq!(values(&vm_dest), vec![1.0, 2.0, 3.0]);

        // Tracking a map into itself must not lock twice.
        track(&vm_src, &vm_src, 0.5)?;
        Ok(())
    }

    #[test]
    fn test_index_with_actions() -> Result<()> {
        let q = Tensor::from_slice(&[1f32, 2., 3., 4., 5., 6.], (2, 3), &Device::Cpu)?;
        let a = Tensor::from_slice(&[2i64, 0], (2,), &Device::Cpu)?;
        assert_eq!(index_with_actions(&q, &a, false)?.to_vec1::<f32>()?, vec![3., 4.]);

        let a = Tensor::from_slice(&[1i64, 1], (2, 1), &Device::Cpu)?;
        assert_eq!(index_with_actions(&q, &a, true)?.to_vec1::<f32>()?, vec![2., 5.]);

        let q = q.reshape((1, 2, 3))?;
        let a = Tensor::from_slice(&[0i64, 2], (1, 2), &Device::Cpu)?;
        assert_eq!(index_with_actions(&q, &a, false)?.to_vec2::<f32>()?, vec![vec![1., 6.]]);
        Ok(())
    }

    #[test]
    fn test_clip_gradient_norms() -> Result<()> {
        let w1 = Var::from_tensor(&Tensor::from_slice(&[3f32, 4.], (2,), &Device::Cpu)?)?;
        let w2 = Var::from_tensor(&Tensor::from_slice(&[0.1f32], (1,), &Device::Cpu)?)?;
        // d/dw (w . w) = 2w
        let loss = (w1.sqr()?.sum_all()? + w2.sqr()?.sum_all()?)?;
        let mut grads = loss.backward()?;

        let norms = clip_gradient_norms(&mut grads, &[w1.clone(), w2.clone()], 1.0)?;
        assert!((norms[0] - 10.0).abs() < 1e-5);
        assert!((norms[1] - 0.2).abs() < 1e-5);

        let g1 = grads.get(w1.as_tensor()).unwrap().to_vec1::<f32>()?;
        assert!((g1[0] - 0.6).abs() < 1e-5 && (g1[1] - 0.8).abs() < 1e-5);
        let g2 = grads.get(w2.as_tensor()).unwrap().to_vec1::<f32>()?;
        assert!((g2[0] - 0.2).abs() < 1e-5);
        Ok(())
    }
}

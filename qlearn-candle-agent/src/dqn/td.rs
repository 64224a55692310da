//! TD targets.
use anyhow::Result;
use candle_core::Tensor;

/// Computes 1-step TD targets,
/// `reward_scale * rewards + gamma * discounts * next_q_values`.
///
/// The targets are detached from the computation graph.
pub fn compute_td_targets(
    next_q_values: &Tensor,
    rewards: &Tensor,
    discounts: &Tensor,
    gamma: f64,
    reward_scale: f64,
) -> Result<Tensor> {
    let next_q_values = next_q_values.detach();
    let rewards = (rewards.to_dtype(next_q_values.dtype())? * reward_scale)?;
    let discounts = (discounts.to_dtype(next_q_values.dtype())? * gamma)?;
    Ok((rewards + (discounts * next_q_values)?)?.detach())
}

/// Computes n-step TD targets from rewards and discounts shaped `[batch, n]`.
///
/// The return is accumulated backwards from the bootstrap value,
/// `ret = reward_scale * r_k + gamma * d_k * ret` for `k = n - 1, ..., 0`,
/// so that
/// `ret = sum_k gamma^k (prod_{j<k} d_j) r_k + gamma^n (prod_k d_k) next_q_values`.
/// A step inside the window with a non-zero discount after an episode
/// boundary is not treated specially.
pub fn compute_n_step_td_targets(
    next_q_values: &Tensor,
    rewards: &Tensor,
    discounts: &Tensor,
    gamma: f64,
    reward_scale: f64,
) -> Result<Tensor> {
    let dtype = next_q_values.dtype();
    let rewards = (rewards.to_dtype(dtype)? * reward_scale)?;
    let discounts = (discounts.to_dtype(dtype)? * gamma)?;
    let n = rewards.dim(1)?;

    let mut ret = next_q_values.detach();
    for k in (0..n).rev() {
        let r = rewards.narrow(1, k, 1)?.squeeze(1)?;
        let d = discounts.narrow(1, k, 1)?.squeeze(1)?;
        ret = (r + (d * ret)?)?;
    }

    Ok(ret.detach())
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_one_step() -> Result<()> {
        let d = &Device::Cpu;
        let next_q = Tensor::from_slice(&[2f32, 2.0], (2,), d)?;
        let r = Tensor::from_slice(&[1f32, 1.0], (2,), d)?;
        let disc = Tensor::from_slice(&[1f32, 0.0], (2,), d)?;

        let tgt = compute_td_targets(&next_q, &r, &disc, 0.9, 1.0)?.to_vec1::<f32>()?;
        assert!((tgt[0] - 2.8).abs() < 1e-6);
        assert!((tgt[1] - 1.0).abs() < 1e-6);

        let tgt = compute_td_targets(&next_q, &r, &disc, 0.5, 2.0)?.to_vec1::<f32>()?;
        assert!((tgt[0] - 3.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_n_step() -> Result<()> {
        let d = &Device::Cpu;
        let next_q = Tensor::from_slice(&[5f32], (1,), d)?;
        let r = Tensor::from_slice(&[1f32, 1.0], (1, 2), d)?;
        let disc = Tensor::from_slice(&[1f32, 1.0], (1, 2), d)?;

        let tgt = compute_n_step_td_targets(&next_q, &r, &disc, 0.9, 1.0)?.to_vec1::<f32>()?;
        assert!((tgt[0] - 5.95).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_n_step_scaled_and_discounted() -> Result<()> {
        let d = &Device::Cpu;
        let next_q = Tensor::from_slice(&[5f32], (1,), d)?;
        let r = Tensor::from_slice(&[1f32, 3.0], (1, 2), d)?;
        let disc = Tensor::from_slice(&[1f32, 0.5], (1, 2), d)?;

        // 2 * 1 + 0.9 * (2 * 3 + 0.9 * 0.5 * 5)
        let tgt = compute_n_step_td_targets(&next_q, &r, &disc, 0.9, 2.0)?.to_vec1::<f32>()?;
        assert!((tgt[0] - 9.425).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_n_step_across_episode_boundary() -> Result<()> {
        // The second reward belongs to the next episode, but the discount at
        // the boundary is 1, so it is accumulated as it is.
        let d = &Device::Cpu;
        let next_q = Tensor::from_slice(&[0f32], (1,), d)?;
        let r = Tensor::from_slice(&[1f32, 10.0], (1, 2), d)?;
        let disc = Tensor::from_slice(&[1f32, 1.0], (1, 2), d)?;

        let tgt = compute_n_step_td_targets(&next_q, &r, &disc, 1.0, 1.0)?.to_vec1::<f32>()?;
        assert!((tgt[0] - 11.0).abs() < 1e-6);

        // A zero discount cuts everything after it.
        let disc = Tensor::from_slice(&[0f32, 1.0], (1, 2), d)?;
        let tgt = compute_n_step_td_targets(&next_q, &r, &disc, 1.0, 1.0)?.to_vec1::<f32>()?;
        assert!((tgt[0] - 1.0).abs() < 1e-6);
        Ok(())
    }
}

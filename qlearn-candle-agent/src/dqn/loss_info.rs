use crate::util::mean_f32;
use anyhow::Result;
use candle_core::{DType, Tensor};
use qlearn_core::record::{Record, RecordValue};

/// Per-element quantities of the TD loss.
#[derive(Clone, Debug)]
pub struct DqnLossInfo {
    /// Weighted, masked loss of each batch element, summed over time if any.
    pub td_loss: Tensor,

    /// Unweighted, masked `target - q_value`, with the time axis if any.
    pub td_error: Tensor,

    /// Action values of the taken actions.
    pub q_values: Tensor,
}

/// Output of the loss computation of [`Dqn`](super::Dqn).
#[derive(Clone, Debug)]
pub struct LossInfo {
    /// Scalar loss to be minimized.
    pub loss: Tensor,

    /// Per-element quantities.
    pub extra: DqnLossInfo,
}

impl LossInfo {
    /// The scalar loss as `f32`.
    pub fn loss_value(&self) -> Result<f32> {
        Ok(self.loss.to_dtype(DType::F32)?.to_scalar::<f32>()?)
    }

    /// Summarizes the loss into a [`Record`].
    pub fn record(&self) -> Result<Record> {
        Ok(Record::from_slice(&[
            ("loss", RecordValue::Scalar(self.loss_value()?)),
            ("td_loss", RecordValue::Scalar(mean_f32(&self.extra.td_loss)?)),
            (
                "td_error_abs",
                RecordValue::Scalar(mean_f32(&self.extra.td_error.abs()?)?),
            ),
            ("q_value", RecordValue::Scalar(mean_f32(&self.extra.q_values)?)),
        ]))
    }
}

//! Element-wise losses of TD errors.
use candle_core::{Result, Tensor};
use serde::{Deserialize, Serialize};

/// Element-wise loss between TD targets and predicted action values.
///
/// The output has the shape of the inputs; reduction over the batch is left
/// to the caller.
pub trait ElementwiseLoss {
    /// Computes the loss of each element.
    fn loss(&self, target: &Tensor, pred: &Tensor) -> Result<Tensor>;
}

impl<F> ElementwiseLoss for F
where
    F: Fn(&Tensor, &Tensor) -> Result<Tensor>,
{
    fn loss(&self, target: &Tensor, pred: &Tensor) -> Result<Tensor> {
        self(target, pred)
    }
}

/// Loss of TD errors selectable in agent configurations.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum TdErrorsLoss {
    /// Huber loss with the given threshold between its quadratic and linear regions.
    Huber(f64),

    /// Squared error.
    Squared,
}

impl Default for TdErrorsLoss {
    fn default() -> Self {
        Self::Huber(1.0)
    }
}

impl ElementwiseLoss for TdErrorsLoss {
    fn loss(&self, target: &Tensor, pred: &Tensor) -> Result<Tensor> {
        match self {
            Self::Huber(delta) => element_wise_huber_loss(target, pred, *delta),
            Self::Squared => element_wise_squared_loss(target, pred),
        }
    }
}

/// Huber loss of each element, `0.5 * x^2` if `|x| <= delta` and
/// `delta * (|x| - 0.5 * delta)` otherwise, where `x = target - pred`.
///
/// See <https://en.wikipedia.org/wiki/Huber_loss>.
pub fn element_wise_huber_loss(target: &Tensor, pred: &Tensor, delta: f64) -> Result<Tensor> {
    let d = (target - pred)?.abs()?;
    let m1 = d.le(delta)?.to_dtype(d.dtype())?;
    let m2 = m1.affine(-1.0, 1.0)?;
    let quadratic = (0.5 * d.sqr()?)?;
    let linear = ((d - 0.5 * delta)? * delta)?;
    (m1 * quadratic)? + (m2 * linear)?
}

/// Squared error of each element.
pub fn element_wise_squared_loss(target: &Tensor, pred: &Tensor) -> Result<Tensor> {
    (target - pred)?.sqr()
}

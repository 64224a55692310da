//! Periodic execution gate.
use crate::error::QlearnError;
use serde::{Deserialize, Serialize};

/// Opens once every `period` calls of [`Periodically::tick`].
///
/// The gate counts calls itself, so callers only report that a step happened
/// and never compute the schedule on their own. With `period = k` the gate
/// stays closed on calls `1..k` and opens on the `k`-th call, then repeats.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Periodically {
    period: usize,
    counter: usize,
}

impl Periodically {
    /// Creates a gate opening every `period` calls.
    pub fn new(period: usize) -> Result<Self, QlearnError> {
        if period == 0 {
            return Err(QlearnError::ConfigurationError(
                "period must be a positive integer".to_string(),
            ));
        }
        Ok(Self { period, counter: 0 })
    }

    /// Counts a call and returns `true` if the gate opens on it.
    pub fn tick(&mut self) -> bool {
        self.counter += 1;
        if self.counter == self.period {
            self.counter = 0;
            true
        } else {
            false
        }
    }

    /// The period of the gate.
    pub fn period(&self) -> usize {
        self.period
    }

    /// Calls counted since the gate last opened.
    pub fn pending(&self) -> usize {
        self.counter
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_period_one_always_opens() -> Result<(), QlearnError> {
        let mut gate = Periodically::new(1)?;
        assert!((0..5).all(|_| gate.tick()));
        Ok(())
    }

    #[test]
    fn test_opens_on_kth_call() -> Result<(), QlearnError> {
        let mut gate = Periodically::new(3)?;
        let opened = (0..9).map(|_| gate.tick()).collect::<Vec<_>>();
        assert_eq!(
            opened,
            vec![false, false, true, false, false, true, false, false, true]
        );
        assert_eq!(gate.pending(), 0);
        Ok(())
    }

    #[test]
    fn test_zero_period() {
        assert!(matches!(
            Periodically::new(0),
            Err(QlearnError::ConfigurationError(_))
        ));
    }
}

//! Records of training information.
//!
//! A [`Record`] is a flat set of named values produced by a training step,
//! for example the loss and summary statistics of TD errors. Agents return
//! records so that an outer training loop can log or store them however it
//! likes.
//!
//! ```rust
//! use qlearn_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("loss", 0.25);
//! record.insert("td_error", RecordValue::Array1(vec![0.5, -0.5]));
//! assert_eq!(record.get_scalar("loss").unwrap(), 0.25);
//! ```
mod base;
pub use base::{Record, RecordValue};

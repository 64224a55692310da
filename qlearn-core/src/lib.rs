#![warn(missing_docs)]
//! Backend-agnostic building blocks for Q-learning agents.
//!
//! Nothing in this crate touches tensors. Agent crates built on a numeric
//! backend, such as `qlearn-candle-agent`, use these types to describe their
//! inputs ([`ArraySpec`], [`Nest`]), to validate discrete action spaces
//! ([`validate_action_spec`]), to schedule periodic work ([`Periodically`])
//! and to report what happened in a training step ([`record::Record`]).
pub mod error;
pub mod record;

mod nest;
pub use nest::Nest;

mod spec;
pub use spec::{validate_action_spec, ArraySpec, BoundedArraySpec, DataType, DiscreteActions};

mod step_type;
pub use step_type::StepType;

mod periodically;
pub use periodically::Periodically;

//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QlearnError {
    /// Invalid construction-time setting of an agent or one of its parts.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Tensor with an unexpected rank or dimensions at call time.
    #[error("Shape error: {0}")]
    ShapeError(String),

    /// Non-finite value where a finite one is required.
    #[error("Numeric error: {0}")]
    NumericError(String),

    /// Flat values do not fit the structure of a [`Nest`](crate::Nest).
    #[error("Nest structure error: {0}")]
    NestStructureError(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}

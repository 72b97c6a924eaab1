//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, PartialEq)]
pub enum RltfError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// The monitored environment must be reset before it can be stepped.
    #[error("Reset needed: {0}")]
    ResetNeeded(String),

    /// A monitor mode other than train or eval was given.
    #[error("Invalid mode {0}: must be t for training or e for evaluation")]
    InvalidMode(String),

    /// A model name which is not in the registry.
    #[error("Unknown model {0}")]
    UnknownModel(String),

    /// Cholesky factorization failed.
    #[error("Matrix is not positive definite (pivot {0})")]
    NotPositiveDefinite(usize),
}

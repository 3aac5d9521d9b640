//! Error type shared by operator constructors and solver entry points.
//!
//! Only construction is fallible: once an operator exists, `op`/`adj_op`
//! and the solver iterations run to completion.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconError {
    #[error("unknown platform '{0}', expected one of 'cpu', 'mcpu' or 'gpu'")]
    UnknownPlatform(String),

    #[error("the '{0}' NUFFT backend is not available in this build")]
    BackendUnavailable(&'static str),

    #[error("oversampled grid {kd:?} must be at least the image size {shape:?} in every dimension")]
    GridTooSmall { kd: Vec<usize>, shape: Vec<usize> },

    #[error("invalid sampling trajectory: {0}")]
    InvalidTrajectory(String),

    #[error("unknown mode '{value}' for {operator}")]
    UnknownMode { operator: &'static str, value: String },

    #[error("{0} requires a linear operator layout")]
    MissingLinearOperator(&'static str),

    #[error("cannot decompose axis of length {len} over {nb_scale} scales")]
    InvalidScale { len: usize, nb_scale: usize },

    #[error("patch layout does not tile the image: {0}")]
    PatchLayout(String),

    #[error("regularization weights must be non-negative")]
    NegativeWeight,

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, ReconError>;

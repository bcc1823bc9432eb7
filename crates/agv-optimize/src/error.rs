//! Optimizer error type.

use thiserror::Error;

use agv_spatial::SpatialError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizeError {
    /// No assignment covers every task exactly once within the constraints.
    #[error("infeasible assignment: {0}")]
    Infeasible(String),

    #[error("cost matrix row {row} has {got} entries, expected {expected}")]
    RaggedMatrix { row: usize, expected: usize, got: usize },

    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

pub type OptimizeResult<T> = Result<T, OptimizeError>;

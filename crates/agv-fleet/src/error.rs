//! Fleet error type.

use thiserror::Error;

use agv_core::RobotId;
use agv_optimize::OptimizeError;
use agv_spatial::SpatialError;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    #[error(transparent)]
    Optimize(#[from] OptimizeError),

    #[error("order line {line}: {message}")]
    MalformedOrder { line: usize, message: String },

    #[error("order file: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0} has no reachable charging station")]
    NoChargingStation(RobotId),
}

pub type FleetResult<T> = Result<T, FleetError>;

use agv_fleet::FleetError;
use agv_kernel::KernelError;
use agv_spatial::SpatialError;
use thiserror::Error;

use crate::ConfigError;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read order file '{file}': {source}")]
    Orders {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Fleet(#[from] FleetError),

    #[error("layout error: {0}")]
    Spatial(#[from] SpatialError),

    #[error("simulation aborted: {0}")]
    Kernel(#[from] KernelError),
}

pub type SimResult<T> = Result<T, SimError>;

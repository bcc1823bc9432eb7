//! Spatial-subsystem error type.

use thiserror::Error;

use agv_core::NodeId;

/// Errors produced by `agv-spatial`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpatialError {
    /// Start and end are disconnected.  Fatal to the motion or cost
    /// computation that asked; never reported as a zero-length path.
    #[error("no path from {from} to {to}")]
    NoPathFound { from: NodeId, to: NodeId },

    #[error("node {0} not found in graph")]
    NodeNotFound(NodeId),

    #[error("no node named '{0}'")]
    UnknownNode(String),

    #[error("node name '{0}' is used twice")]
    DuplicateNode(String),

    #[error("graph has no nodes")]
    EmptyGraph,
}

pub type SpatialResult<T> = Result<T, SpatialError>;

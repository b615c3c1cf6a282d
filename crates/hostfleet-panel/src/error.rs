//! Panel data source error types.

use thiserror::Error;

use crate::types::NodeId;

/// Errors surfaced by a [`crate::PanelSource`] implementation.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("panel unreachable: {0}")]
    Unavailable(String),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
}

pub type PanelResult<T> = Result<T, PanelError>;

use thiserror::Error;

use super::config::ConfigError;
use super::tasks::verify::InvariantError;
use crate::core::models::bonds::BondSetError;
use crate::core::models::lattice::GeometryError;
use crate::core::models::system::TopologyError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A staging or initialization parameter is invalid. The engine state
    /// is unchanged and the call may be retried.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A lifecycle operation was issued in the wrong state, e.g. staging
    /// after `initialize` or initializing twice without `cleanup`.
    #[error("`{operation}` is not valid while the engine is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// The verifier found a broken simulation invariant. This indicates an
    /// implementation bug or a corrupted input and is fatal to the run.
    #[error(transparent)]
    Invariant(#[from] InvariantError),
}

impl From<GeometryError> for EngineError {
    fn from(err: GeometryError) -> Self {
        Self::Config(err.into())
    }
}

impl From<BondSetError> for EngineError {
    fn from(err: BondSetError) -> Self {
        Self::Config(err.into())
    }
}

impl From<TopologyError> for EngineError {
    fn from(err: TopologyError) -> Self {
        Self::Config(err.into())
    }
}

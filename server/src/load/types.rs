//! Load-simulation error definitions

use thiserror::Error;

/// Errors raised while classifying or running a load request
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Invalid load type: {0:?}")]
    InvalidLoadType(String),

    #[error("Computation task failed: {0}")]
    ComputationFailed(String),
}

//! Engine bridge error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Failed to start engine: {0}")]
    Spawn(String),

    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Engine terminated")]
    Terminated,
}

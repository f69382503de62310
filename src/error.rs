//! Error types for Pendiente

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{op}: expected {expected} input(s), got {got}")]
    InputArity {
        op: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{op}: shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        op: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("No computation graph: {0}")]
    NoGraph(String),

    #[error("Cannot reduce gradient of shape {from:?} to shape {to:?}")]
    BroadcastReduction { from: Vec<usize>, to: Vec<usize> },

    #[error("Recursive backward exceeded depth limit of {limit}")]
    RecursionLimit { limit: usize },

    #[error("Stale handle: {0}")]
    StaleHandle(String),

    #[error("Backward operation failed: {0}")]
    BackwardFailed(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

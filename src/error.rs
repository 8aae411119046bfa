//! Error types for the simulation core
//!
//! Nothing is retried internally; every failure reaches the caller of the
//! orchestrator as one of these variants.

use thiserror::Error;

/// Result type for simulation operations
pub type SimResult<T> = Result<T, SimError>;

/// Errors that can occur while configuring or stepping a simulation
#[derive(Error, Debug)]
pub enum SimError {
    /// The requested compute backend cannot be acquired (no adapter/device)
    #[error("Compute capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// The device went away or readback failed mid-step
    #[error("Compute backend lost: {0}")]
    BackendLost(String),

    /// Flat buffer does not hold a whole number of records, or wrong ball count
    #[error("Invalid buffer shape: expected {expected} floats, got {actual}")]
    InvalidBufferShape { expected: usize, actual: usize },

    /// A ball carries state the physics cannot handle
    #[error("Invalid ball {index}: {reason}")]
    InvalidBallState { index: usize, reason: String },

    /// Step requested before the backend was initialized and loaded
    #[error("Simulation not ready: {0}")]
    NotReady(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    /// Shape error for a flat buffer whose length is not a multiple of the stride
    pub fn stride(actual: usize) -> Self {
        let expected = actual.div_ceil(crate::consts::RECORD_STRIDE) * crate::consts::RECORD_STRIDE;
        SimError::InvalidBufferShape { expected, actual }
    }
}

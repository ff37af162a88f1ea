//! Error types for the simulation core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// Outcome search used every permitted attempt without a match
    #[error("no valid run found after {attempts} attempts")]
    SearchExhausted { attempts: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("no bucket matches multiplier {0}")]
    NoBucketForMultiplier(f64),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SimError::InvalidConfiguration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SimError>;

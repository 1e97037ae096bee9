//! Error types for the stride_core library.

use crate::SpeedMode;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for stride_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A workout with no blocks was handed to the engine
    #[error("Workout '{workout_id}' has no blocks")]
    EmptyWorkout { workout_id: String },

    /// Device capabilities lack a field required by their declared mode
    #[error("Device capabilities in {mode:?} mode are missing `{field}`")]
    MissingCapability {
        mode: SpeedMode,
        field: &'static str,
    },

    /// The device speed pool came out empty
    #[error("Device speed pool is empty")]
    EmptySpeedPool,

    /// Device capabilities are present but unusable (non-finite values, bad increment)
    #[error("Invalid device capabilities: {0}")]
    InvalidCapabilities(String),

    /// Preset lookup failed
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for caller errors that are rejected before any state changes
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::EmptyWorkout { .. }
                | Error::MissingCapability { .. }
                | Error::EmptySpeedPool
                | Error::InvalidCapabilities(_)
        )
    }
}

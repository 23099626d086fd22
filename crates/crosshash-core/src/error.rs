//! Error types for the crosshash training core.
//!
//! Errors are split into configuration problems (fatal before the first
//! training step) and training/evaluation problems (fatal to the run).
//! Numeric failures (NaN/Inf losses) are deliberately not represented here:
//! they propagate through the float values and abort the run at the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for crosshash operations.
#[derive(Error, Debug)]
pub enum CrosshashError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Training and evaluation errors
    #[error("Training error: {0}")]
    Train(#[from] TrainError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
///
/// Unknown values for `similarity_function`, `loss_type`, or `hash_layer`
/// surface as `ParseError`; they are enums and are never silently defaulted.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Training and evaluation errors.
#[derive(Error, Debug)]
pub enum TrainError {
    /// Paired batches disagree on feature dimensionality
    #[error("Shape mismatch: expected feature dimension {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    /// Paired matrices disagree on row count
    #[error("Row count mismatch in {context}: {left} vs {right}")]
    RowMismatch {
        context: &'static str,
        left: usize,
        right: usize,
    },

    /// Code-buffer write past the end of the buffer
    #[error("Sample index {index} out of bounds for buffer of {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Select-mode encoder was handed an empty slot list
    #[error("Hash encoder received an empty slot list")]
    EmptySlots,

    /// Evaluation-only run requested without a loaded checkpoint
    #[error("Evaluation requires a checkpoint: set the `pretrained` path")]
    MissingCheckpoint,

    /// Checkpoint file could not be read or applied
    #[error("Checkpoint error for {path}: {message}")]
    Checkpoint { path: PathBuf, message: String },

    /// Model forward/encode failure reported by an external collaborator
    #[error("Model error: {0}")]
    Model(String),
}

/// Convenience type alias for crosshash results.
pub type Result<T> = std::result::Result<T, CrosshashError>;

/// Convenience type alias for training-specific results.
pub type TrainResult<T> = std::result::Result<T, TrainError>;

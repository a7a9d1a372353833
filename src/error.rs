//! Error types for Pulse Flux

use thiserror::Error;

/// Errors that can occur at the edges of the pipeline.
///
/// The signal math itself never fails; missing data simply yields `None`.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid heart-rate sample: {0}")]
    InvalidSample(String),

    #[error("Sample timestamp went backwards: previous {previous}s, got {got}s")]
    NonMonotonicTimestamp { previous: f64, got: f64 },

    #[error("Invalid motion reading: {0}")]
    InvalidMotion(String),

    #[error("Invalid practice metrics: {0}")]
    InvalidPracticeMetrics(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

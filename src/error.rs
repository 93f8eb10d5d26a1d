//! Error types for Convergr
//!
//! Centralized error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

/// All error types that can occur in Convergr
#[derive(Debug, Error)]
pub enum ConvergrError {
    /// Manifest is empty, has an empty entry, or collides after normalization
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// Generator call failed
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Generator call exceeded its time bound
    #[error("Generator timed out after {0:?}")]
    GeneratorTimeout(Duration),

    /// Checkpoint could not be saved, found, or restored
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Invalid loop configuration
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Convergr operations
pub type Result<T> = std::result::Result<T, ConvergrError>;

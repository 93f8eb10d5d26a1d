//! The Generator boundary.
//!
//! A generator is the external capability that actually produces files. The
//! convergence loop hands it the outstanding canonical paths once per
//! iteration and reconciles whatever it reports back. Implementations:
//! - CommandGenerator: runs a shell command, paths on stdin, reports on stdout
//! - ScriptedGenerator: replays canned per-iteration responses (tests, dry runs)

mod command;
mod scripted;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConvergrError;

pub use command::{CommandGenerator, CommandGeneratorConfig};
pub use scripted::{ScriptStep, ScriptedGenerator};

/// Input to one generator invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Iteration being run (1-indexed)
    pub iteration: u32,

    /// Canonical outstanding paths in manifest order
    pub outstanding: Vec<String>,
}

/// One produced-path report as returned by a generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducedReport {
    /// Path as reported, in whatever spelling the generator used
    pub raw_path: String,
    pub iteration: u32,
}

impl ProducedReport {
    pub fn new(raw_path: impl Into<String>, iteration: u32) -> Self {
        Self {
            raw_path: raw_path.into(),
            iteration,
        }
    }
}

/// Errors a generator invocation can end with
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("Generator failed: {0}")]
    Failed(String),

    #[error("Generator timed out after {0:?}")]
    Timeout(Duration),

    #[error("Generator IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<GeneratorError> for ConvergrError {
    fn from(err: GeneratorError) -> Self {
        match err {
            GeneratorError::Timeout(after) => ConvergrError::GeneratorTimeout(after),
            other => ConvergrError::Generation(other.to_string()),
        }
    }
}

/// External capability that produces files for outstanding paths.
///
/// Implementations may report fewer paths than requested, paths that were
/// never requested, or nothing at all. The loop bounds each call with its
/// own timeout.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<ProducedReport>, GeneratorError>;
}

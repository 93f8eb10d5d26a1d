//! Convergence loop module - bounded iteration against a manifest.
//!
//! This module provides the control loop, including:
//! - ConvergenceLoop for driving a generator to completion
//! - LoopConfig with the stagnation and hard-cap bounds
//! - LoopState, IterationSummary, and RunOutcome for the audit trail
//! - CancelSignal for external cancellation between iterations

mod cancel;
mod config;
mod loop_runner;
mod state;

pub use cancel::{CancelSignal, CancellationFlag, NeverCancel};
pub use config::{DEFAULT_GENERATOR_TIMEOUT, DEFAULT_HARD_ITERATION_CAP, DEFAULT_STAGNATION_THRESHOLD, LoopConfig};
pub use loop_runner::ConvergenceLoop;
pub use state::{Checkpoint, IterationSummary, LoopState, ReportAudit, RunOutcome, RunStatus};

//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: start a new run over a manifest file
//! - resume: continue a checkpointed run
//! - history: show a run's iteration history
//! - runs: list checkpointed runs
//! - normalize: show how a path is normalized

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Convergr - drive file generation until a manifest is complete
#[derive(Parser, Debug)]
#[command(name = "convergr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Overrides for the loop bounds and generator
#[derive(Args, Debug, Clone, Default)]
pub struct LoopArgs {
    /// Generator shell command (paths on stdin, reports on stdout)
    #[arg(long)]
    pub command: Option<String>,

    /// Iterations without progress before stalling
    #[arg(long)]
    pub stagnation: Option<u32>,

    /// Absolute iteration cap
    #[arg(long)]
    pub cap: Option<u32>,

    /// Per-call generator timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a new run over a manifest file
    Run {
        /// Manifest file, one target path per line
        manifest: PathBuf,

        /// Root prefix to strip during normalization (repeatable)
        #[arg(long = "strip-prefix")]
        strip_prefix: Vec<String>,

        /// Don't write checkpoints for this run
        #[arg(long)]
        no_checkpoint: bool,

        #[command(flatten)]
        loop_args: LoopArgs,
    },

    /// Resume a checkpointed run
    Resume {
        /// Run ID to resume
        run_id: String,

        #[command(flatten)]
        loop_args: LoopArgs,
    },

    /// Show the iteration history of a run
    History {
        /// Run ID to inspect
        run_id: String,

        /// Show every report and how it was matched
        #[arg(short, long)]
        detailed: bool,
    },

    /// List checkpointed runs
    Runs,

    /// Print the normalized form of a path
    Normalize {
        /// Path to normalize
        path: String,

        /// Root prefix to strip (repeatable; defaults to configured prefixes)
        #[arg(long = "strip-prefix")]
        strip_prefix: Vec<String>,
    },
}

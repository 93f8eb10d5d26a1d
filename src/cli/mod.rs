//! CLI module for convergr - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running, resuming,
//! and inspecting convergence runs.

pub mod commands;

pub use commands::Cli;

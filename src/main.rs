use clap::Parser;
use colored::*;
use convergr::generator::CommandGenerator;
use convergr::manifest::load_manifest;
use convergr::reconcile::{MatchResult, PathNormalizer};
use convergr::runner::{CancellationFlag, ConvergenceLoop, IterationSummary, LoopConfig, RunOutcome, RunStatus};
use convergr::storage::CheckpointStore;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

mod cli;
mod config;

use cli::Cli;
use cli::commands::{Commands, LoopArgs};
use config::Config;

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("convergr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("convergr.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<RunStatus> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run {
            manifest,
            strip_prefix,
            no_checkpoint,
            loop_args,
        } => handle_run_command(manifest, strip_prefix, *no_checkpoint, loop_args, cli.is_verbose(), config).await,
        Commands::Resume { run_id, loop_args } => {
            handle_resume_command(run_id, loop_args, cli.is_verbose(), config).await
        }
        Commands::History { run_id, detailed } => {
            handle_history_command(run_id, *detailed, config)?;
            Ok(RunStatus::Converged)
        }
        Commands::Runs => {
            handle_runs_command(config)?;
            Ok(RunStatus::Converged)
        }
        Commands::Normalize { path, strip_prefix } => {
            handle_normalize_command(path, strip_prefix, config);
            Ok(RunStatus::Converged)
        }
    }
}

fn loop_config(args: &LoopArgs, config: &Config) -> LoopConfig {
    let mut loop_config = config.convergence.to_loop_config();
    if let Some(stagnation) = args.stagnation {
        loop_config = loop_config.stagnation_threshold(stagnation);
    }
    if let Some(cap) = args.cap {
        loop_config = loop_config.hard_iteration_cap(cap);
    }
    if let Some(ms) = args.timeout_ms {
        loop_config = loop_config.generator_timeout(Duration::from_millis(ms));
    }
    loop_config
}

fn command_generator(args: &LoopArgs, config: &Config) -> Result<Arc<CommandGenerator>> {
    let command_config = config
        .generator
        .to_command_config(args.command.as_deref())
        .ok_or_else(|| eyre!("No generator command: pass --command or set generator.command in the config"))?;
    Ok(Arc::new(CommandGenerator::new(command_config)))
}

fn cancel_on_ctrl_c() -> CancellationFlag {
    let flag = CancellationFlag::new();
    let handle = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Cancelling after the current iteration...".yellow());
            handle.cancel();
        }
    });
    flag
}

async fn handle_run_command(
    manifest_path: &Path,
    strip_prefix: &[String],
    no_checkpoint: bool,
    args: &LoopArgs,
    verbose: bool,
    config: &Config,
) -> Result<RunStatus> {
    let manifest = load_manifest(manifest_path)
        .context(format!("Failed to read manifest {}", manifest_path.display()))?;
    let mut loop_config = loop_config(args, config);
    if !strip_prefix.is_empty() {
        loop_config = loop_config.root_prefixes(strip_prefix.iter().cloned());
    }

    let generator = command_generator(args, config)?;
    let runner = ConvergenceLoop::new(&manifest, generator, loop_config)
        .context("Failed to start run")?
        .with_cancel(Arc::new(cancel_on_ctrl_c()));

    println!(
        "{} {} ({} target paths)",
        "Run:".green(),
        runner.run_id(),
        runner.reconciler().len()
    );

    let store = if no_checkpoint || !config.storage.checkpoint {
        None
    } else {
        Some(CheckpointStore::open(&config.storage.state_dir).context("Failed to open checkpoint store")?)
    };

    drive(runner, store.as_ref(), verbose).await
}

async fn handle_resume_command(run_id: &str, args: &LoopArgs, verbose: bool, config: &Config) -> Result<RunStatus> {
    let store = CheckpointStore::open(&config.storage.state_dir).context("Failed to open checkpoint store")?;
    let checkpoint = store.load(run_id).context(format!("Failed to load run {}", run_id))?;
    let generator = command_generator(args, config)?;

    let runner = ConvergenceLoop::resume(checkpoint, generator, loop_config(args, config))
        .context("Failed to resume run")?
        .with_cancel(Arc::new(cancel_on_ctrl_c()));

    println!(
        "{} {} at iteration {} ({} outstanding)",
        "Resuming:".green(),
        runner.run_id(),
        runner.state().iteration_index,
        runner.reconciler().outstanding_count()
    );

    drive(runner, Some(&store), verbose).await
}

/// Step the loop to completion, checkpointing after every iteration.
async fn drive(
    mut runner: ConvergenceLoop<CommandGenerator>,
    store: Option<&CheckpointStore>,
    verbose: bool,
) -> Result<RunStatus> {
    if let Some(store) = store {
        store.save(&runner.checkpoint()).context("Failed to save checkpoint")?;
    }

    while !runner.state().status.is_terminal() {
        let before = runner.state().history.len();
        runner.step().await;

        if let Some(summary) = runner.state().history.get(before) {
            print_iteration(summary, verbose);
            if let Some(store) = store {
                store
                    .append_history(runner.run_id(), summary)
                    .context("Failed to append history")?;
            }
        }
        if let Some(store) = store {
            store.save(&runner.checkpoint()).context("Failed to save checkpoint")?;
        }
    }

    let outcome = runner.outcome();
    print_outcome(&outcome);
    Ok(outcome.status)
}

fn print_iteration(summary: &IterationSummary, verbose: bool) {
    let line = format!(
        "  [{}] +{} completed, {} outstanding",
        summary.iteration, summary.completed_this_round, summary.outstanding_after
    );
    if summary.made_progress() {
        println!("{}", line.green());
    } else {
        println!("{}", line.dimmed());
    }
    if let Some(error) = &summary.generator_error {
        println!("      {} {}", "generator:".red(), error);
    }
    if verbose {
        print_reports(summary);
    }
}

fn print_reports(summary: &IterationSummary) {
    for report in &summary.reports {
        let detail = match &report.result {
            MatchResult::Matched { canonical, strategy } => format!("-> {} ({})", canonical, strategy).green(),
            MatchResult::AlreadyCompleted { canonical, .. } => format!("== {} (already done)", canonical).normal(),
            MatchResult::Ambiguous { candidates, .. } => format!("?? ambiguous: {}", candidates.join(", ")).yellow(),
            MatchResult::Unmatched => "xx not in manifest".dimmed(),
        };
        println!("      {} {}", report.raw_path, detail);
    }
}

fn print_outcome(outcome: &RunOutcome) {
    let status = outcome.status.to_string();
    let status = match outcome.status {
        RunStatus::Converged => status.green().bold(),
        RunStatus::Cancelled => status.yellow().bold(),
        _ => status.red().bold(),
    };
    println!(
        "{} {} after {} iterations",
        "Finished:".green(),
        status,
        outcome.iterations()
    );
    if !outcome.outstanding.is_empty() {
        println!("{} ({})", "Outstanding:".yellow(), outcome.outstanding.len());
        for path in &outcome.outstanding {
            println!("  {}", path);
        }
    }
}

fn format_ms(ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(ms as i64)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn handle_history_command(run_id: &str, detailed: bool, config: &Config) -> Result<()> {
    info!("Showing history for run: {}", run_id);
    let store = CheckpointStore::open(&config.storage.state_dir).context("Failed to open checkpoint store")?;
    let history = store.load_history(run_id).context("Failed to read history")?;
    if history.is_empty() {
        println!("{} {}", "No history for run".yellow(), run_id);
        return Ok(());
    }

    println!("{} {}", "History for:".green(), run_id);
    for summary in &history {
        println!(
            "  [{}] {} +{} completed, {} outstanding{}",
            summary.iteration,
            format_ms(summary.started_at_ms).dimmed(),
            summary.completed_this_round,
            summary.outstanding_after,
            if summary.generator_error.is_some() {
                " (generator failed)".red().to_string()
            } else {
                String::new()
            }
        );
        if detailed {
            print_reports(summary);
        }
    }
    Ok(())
}

fn handle_runs_command(config: &Config) -> Result<()> {
    let store = CheckpointStore::open(&config.storage.state_dir).context("Failed to open checkpoint store")?;
    let ids = store.list().context("Failed to list runs")?;
    if ids.is_empty() {
        println!("{}", "No runs recorded".yellow());
        return Ok(());
    }

    for id in ids {
        match store.load(&id) {
            Ok(checkpoint) => {
                let outstanding = checkpoint
                    .reconciler
                    .records
                    .iter()
                    .filter(|r| r.is_outstanding())
                    .count();
                println!(
                    "  {}  {:<10}  iterations {:>4}  outstanding {:>4}/{}  {}",
                    id,
                    checkpoint.loop_state.status.to_string(),
                    checkpoint.loop_state.iteration_index,
                    outstanding,
                    checkpoint.reconciler.records.len(),
                    format_ms(checkpoint.saved_at_ms).dimmed()
                );
            }
            Err(e) => println!("  {}  {} {}", id, "unreadable:".red(), e),
        }
    }
    Ok(())
}

fn handle_normalize_command(path: &str, strip_prefix: &[String], config: &Config) {
    let prefixes = if strip_prefix.is_empty() {
        config.convergence.root_prefixes.as_slice()
    } else {
        strip_prefix
    };
    println!("{}", PathNormalizer::new(prefixes).normalize(path));
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    let status = run_application(&cli, &config).await.context("Application failed")?;

    match status {
        RunStatus::Converged => Ok(()),
        RunStatus::Cancelled => std::process::exit(130),
        _ => std::process::exit(2),
    }
}

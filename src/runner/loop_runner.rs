//! Convergence loop implementation.
//!
//! The ConvergenceLoop drives the generator until every manifest entry is
//! reported complete, progress stalls, the hard cap is hit, or the caller
//! cancels. Iterations are strictly sequential: the outstanding set handed
//! to the generator always reflects every completion recorded so far.

use std::sync::Arc;

use log::{debug, info, warn};

use super::cancel::{CancelSignal, NeverCancel};
use super::config::LoopConfig;
use super::state::{Checkpoint, IterationSummary, LoopState, ReportAudit, RunOutcome, RunStatus};
use crate::error::Result;
use crate::generator::{GenerationRequest, Generator, GeneratorError, ProducedReport};
use crate::id::{generate_run_id, now_ms};
use crate::reconcile::{PathNormalizer, Reconciler};

/// Drives bounded, iterative generation against a fixed manifest.
///
/// Each iteration:
/// 1. Reads the outstanding paths (converges without calling the generator if none)
/// 2. Calls the generator, bounded by `generator_timeout`
/// 3. Reconciles every returned report
/// 4. Resets or bumps the stagnation counter
/// 5. Records an IterationSummary
/// 6. Checks Converged, then Stalled, then CappedOut
pub struct ConvergenceLoop<G>
where
    G: Generator,
{
    generator: Arc<G>,
    reconciler: Reconciler,
    state: LoopState,
    config: LoopConfig,
    cancel: Arc<dyn CancelSignal>,
}

impl<G> ConvergenceLoop<G>
where
    G: Generator,
{
    /// Start a fresh run over `manifest`.
    pub fn new<S: AsRef<str>>(manifest: &[S], generator: Arc<G>, config: LoopConfig) -> Result<Self> {
        config.validate()?;
        let reconciler = Reconciler::new(manifest, PathNormalizer::new(&config.root_prefixes))?;
        let state = LoopState::new(generate_run_id());
        info!(
            "Run {} starting with {} target paths (stagnation {}, cap {})",
            state.run_id,
            reconciler.len(),
            config.stagnation_threshold,
            config.hard_iteration_cap
        );

        Ok(Self {
            generator,
            reconciler,
            state,
            config,
            cancel: Arc::new(NeverCancel),
        })
    }

    /// Continue a checkpointed run.
    ///
    /// A terminal run is reopened: its status returns to Running and the
    /// stagnation counter restarts, while the iteration index and history
    /// carry over so the hard cap still bounds the run as a whole. Path
    /// normalization keeps the checkpoint's root prefixes.
    pub fn resume(checkpoint: Checkpoint, generator: Arc<G>, config: LoopConfig) -> Result<Self> {
        config.validate()?;
        let reconciler = Reconciler::from_state(checkpoint.reconciler)?;
        let mut state = checkpoint.loop_state;
        info!(
            "Resuming run {} at iteration {} ({} outstanding, previously {})",
            state.run_id,
            state.iteration_index,
            reconciler.outstanding_count(),
            state.status
        );
        state.status = RunStatus::Running;
        state.iterations_since_progress = 0;
        state.updated_at_ms = now_ms();

        Ok(Self {
            generator,
            reconciler,
            state,
            config,
            cancel: Arc::new(NeverCancel),
        })
    }

    /// Attach an external cancel signal.
    pub fn with_cancel(mut self, cancel: Arc<dyn CancelSignal>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.state.run_id
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Snapshot the whole run for persistence.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            reconciler: self.reconciler.state(),
            loop_state: self.state.clone(),
            saved_at_ms: now_ms(),
        }
    }

    /// Run until a terminal state is reached.
    pub async fn run(&mut self) -> RunOutcome {
        self.run_with_observer(|_| {}).await
    }

    /// Run until a terminal state, calling `on_iteration` after each iteration.
    pub async fn run_with_observer<F>(&mut self, mut on_iteration: F) -> RunOutcome
    where
        F: FnMut(&IterationSummary),
    {
        while !self.state.status.is_terminal() {
            let before = self.state.history.len();
            self.step().await;
            if let Some(summary) = self.state.history.get(before) {
                on_iteration(summary);
            }
        }

        info!(
            "Run {} finished {} after {} iterations ({} outstanding)",
            self.state.run_id,
            self.state.status,
            self.state.iteration_index,
            self.reconciler.outstanding_count()
        );
        self.outcome()
    }

    /// Perform at most one iteration and return the resulting status.
    ///
    /// Terminal runs are left untouched.
    pub async fn step(&mut self) -> RunStatus {
        if self.state.status.is_terminal() {
            return self.state.status;
        }

        if self.reconciler.is_complete() {
            return self.finish(RunStatus::Converged);
        }
        if self.cancel.is_cancelled().await {
            info!("Run {} cancelled before iteration {}", self.state.run_id, self.state.iteration_index + 1);
            return self.finish(RunStatus::Cancelled);
        }
        if self.state.iteration_index >= self.config.hard_iteration_cap {
            return self.finish(RunStatus::CappedOut);
        }

        let iteration = self.state.iteration_index + 1;
        let request = GenerationRequest {
            iteration,
            outstanding: self.reconciler.outstanding(),
        };
        let before = request.outstanding.len();
        let started_at_ms = now_ms();

        debug!("Iteration {}: requesting {} outstanding paths", iteration, before);
        let (reports, generator_error) = match self.invoke(&request).await {
            Ok(reports) => (reports, None),
            Err(e) => {
                warn!("Iteration {}: {}; counting as zero progress", iteration, e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        let reports: Vec<ReportAudit> = reports
            .into_iter()
            .map(|report| {
                let result = self.reconciler.report_completion(&report.raw_path, iteration);
                ReportAudit {
                    raw_path: report.raw_path,
                    result,
                }
            })
            .collect();

        let after = self.reconciler.outstanding_count();
        if after < before {
            self.state.iterations_since_progress = 0;
        } else {
            self.state.iterations_since_progress += 1;
        }

        let summary = IterationSummary {
            iteration,
            completed_this_round: before - after,
            outstanding_after: after,
            reports,
            generator_error,
            started_at_ms,
            finished_at_ms: now_ms(),
        };
        for ambiguous in summary.ambiguous_reports() {
            info!("Iteration {}: ambiguous report {:?} left unresolved", iteration, ambiguous.raw_path);
        }
        info!(
            "Iteration {}: completed {}, {} outstanding, {} without progress",
            iteration, summary.completed_this_round, after, self.state.iterations_since_progress
        );

        self.state.history.push(summary);
        self.state.iteration_index = iteration;
        self.state.updated_at_ms = now_ms();

        if after == 0 {
            self.finish(RunStatus::Converged)
        } else if self.state.iterations_since_progress >= self.config.stagnation_threshold {
            self.finish(RunStatus::Stalled)
        } else if self.state.iteration_index >= self.config.hard_iteration_cap {
            self.finish(RunStatus::CappedOut)
        } else {
            RunStatus::Running
        }
    }

    async fn invoke(&self, request: &GenerationRequest) -> std::result::Result<Vec<ProducedReport>, GeneratorError> {
        let timeout = self.config.generator_timeout;
        match tokio::time::timeout(timeout, self.generator.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(GeneratorError::Timeout(timeout)),
        }
    }

    fn finish(&mut self, status: RunStatus) -> RunStatus {
        self.state.status = status;
        self.state.updated_at_ms = now_ms();
        status
    }

    /// Outcome as of now; meaningful once the run is terminal.
    pub fn outcome(&self) -> RunOutcome {
        RunOutcome {
            run_id: self.state.run_id.clone(),
            status: self.state.status,
            outstanding: self.reconciler.outstanding(),
            history: self.state.history.clone(),
        }
    }
}

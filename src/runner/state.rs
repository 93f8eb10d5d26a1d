//! Loop state, the per-iteration audit trail, and run outcomes.

use serde::{Deserialize, Serialize};

use crate::id::now_ms;
use crate::reconcile::{MatchResult, ReconcilerState};

/// Status of a convergence run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Still iterating
    Running,
    /// Every manifest entry completed
    Converged,
    /// Too many consecutive iterations without a new completion
    Stalled,
    /// Hard iteration cap reached
    CappedOut,
    /// Stopped by an external cancel signal
    Cancelled,
}

impl RunStatus {
    /// Returns true for every status except Running
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// Returns true if the run finished with work left over
    pub fn is_incomplete(&self) -> bool {
        matches!(self, RunStatus::Stalled | RunStatus::CappedOut | RunStatus::Cancelled)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStatus::Running => "running",
            RunStatus::Converged => "converged",
            RunStatus::Stalled => "stalled",
            RunStatus::CappedOut => "capped_out",
            RunStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// One report and what reconciliation made of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportAudit {
    pub raw_path: String,
    pub result: MatchResult,
}

/// Summary of a single iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationSummary {
    /// Iteration number (1-indexed)
    pub iteration: u32,

    /// Records newly completed in this iteration
    pub completed_this_round: usize,

    /// Outstanding count after reconciliation
    pub outstanding_after: usize,

    /// Every report the generator returned, in order
    pub reports: Vec<ReportAudit>,

    /// Set when the generator failed or timed out
    pub generator_error: Option<String>,

    pub started_at_ms: u64,
    pub finished_at_ms: u64,
}

impl IterationSummary {
    pub fn made_progress(&self) -> bool {
        self.completed_this_round > 0
    }

    /// Reports that resolved ambiguously, for the audit log
    pub fn ambiguous_reports(&self) -> impl Iterator<Item = &ReportAudit> {
        self.reports
            .iter()
            .filter(|r| matches!(r.result, MatchResult::Ambiguous { .. }))
    }

    pub fn unmatched_reports(&self) -> impl Iterator<Item = &ReportAudit> {
        self.reports.iter().filter(|r| r.result == MatchResult::Unmatched)
    }
}

/// Loop-owned state for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopState {
    pub run_id: String,

    pub status: RunStatus,

    /// Iterations run so far
    pub iteration_index: u32,

    /// Consecutive iterations without a new completion
    pub iterations_since_progress: u32,

    pub history: Vec<IterationSummary>,

    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl LoopState {
    pub fn new(run_id: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            run_id: run_id.into(),
            status: RunStatus::Running,
            iteration_index: 0,
            iterations_since_progress: 0,
            history: Vec::new(),
            created_at_ms: now,
            updated_at_ms: now,
        }
    }
}

/// Full serializable state of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub reconciler: ReconcilerState,
    pub loop_state: LoopState,
    pub saved_at_ms: u64,
}

impl Checkpoint {
    pub fn run_id(&self) -> &str {
        &self.loop_state.run_id
    }
}

/// What a finished run hands back to its caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub status: RunStatus,
    /// Canonical paths still outstanding; empty only when converged
    pub outstanding: Vec<String>,
    pub history: Vec<IterationSummary>,
}

impl RunOutcome {
    pub fn is_converged(&self) -> bool {
        self.status == RunStatus::Converged
    }

    pub fn iterations(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::MatchStrategy;

    fn summary(reports: Vec<ReportAudit>, completed: usize) -> IterationSummary {
        IterationSummary {
            iteration: 1,
            completed_this_round: completed,
            outstanding_after: 0,
            reports,
            generator_error: None,
            started_at_ms: 0,
            finished_at_ms: 0,
        }
    }

    #[test]
    fn test_run_status_terminal() {
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Converged.is_terminal());
        assert!(RunStatus::Stalled.is_terminal());
        assert!(RunStatus::CappedOut.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_run_status_incomplete() {
        assert!(!RunStatus::Converged.is_incomplete());
        assert!(!RunStatus::Running.is_incomplete());
        assert!(RunStatus::Stalled.is_incomplete());
        assert!(RunStatus::Cancelled.is_incomplete());
    }

    #[test]
    fn test_run_status_serde_names() {
        assert_eq!(serde_json::to_string(&RunStatus::CappedOut).unwrap(), "\"capped_out\"");
        assert_eq!(RunStatus::CappedOut.to_string(), "capped_out");
    }

    #[test]
    fn test_loop_state_new() {
        let state = LoopState::new("1738300800123-a1b2");
        assert_eq!(state.status, RunStatus::Running);
        assert_eq!(state.iteration_index, 0);
        assert_eq!(state.iterations_since_progress, 0);
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_summary_filters() {
        let s = summary(
            vec![
                ReportAudit {
                    raw_path: "a.py".into(),
                    result: MatchResult::Matched {
                        canonical: "a.py".into(),
                        strategy: MatchStrategy::Exact,
                    },
                },
                ReportAudit {
                    raw_path: "util.py".into(),
                    result: MatchResult::Ambiguous {
                        strategy: MatchStrategy::FileName,
                        candidates: vec!["x/util.py".into(), "y/util.py".into()],
                    },
                },
                ReportAudit {
                    raw_path: "nope.md".into(),
                    result: MatchResult::Unmatched,
                },
            ],
            1,
        );
        assert!(s.made_progress());
        assert_eq!(s.ambiguous_reports().count(), 1);
        assert_eq!(s.unmatched_reports().next().unwrap().raw_path, "nope.md");
    }

    #[test]
    fn test_report_audit_json_shape() {
        let audit = ReportAudit {
            raw_path: "project/src/a.py".into(),
            result: MatchResult::Matched {
                canonical: "src/a.py".into(),
                strategy: MatchStrategy::Suffix,
            },
        };
        let value = serde_json::to_value(&audit).unwrap();
        assert_eq!(value["result"]["kind"], "matched");
        assert_eq!(value["result"]["strategy"], "suffix");
    }
}

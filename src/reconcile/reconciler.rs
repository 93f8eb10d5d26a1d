//! The manifest reconciler - ground truth for which target paths are done.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use super::normalize::PathNormalizer;
use super::strategy::{self, Candidate, MatchStrategy, StrategyOutcome};
use crate::error::{ConvergrError, Result};

/// Completion status of a manifest entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStatus {
    Outstanding,
    Completed,
}

/// One manifest entry and its completion audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRecord {
    /// Path exactly as it appears in the manifest
    pub canonical_path: String,

    pub status: PathStatus,

    /// Iteration (1-indexed) in which the record completed
    pub completed_at_iteration: Option<u32>,

    /// Raw report path that triggered completion
    pub matched_report_path: Option<String>,
}

impl PathRecord {
    fn new(canonical_path: String) -> Self {
        Self {
            canonical_path,
            status: PathStatus::Outstanding,
            completed_at_iteration: None,
            matched_report_path: None,
        }
    }

    pub fn is_outstanding(&self) -> bool {
        self.status == PathStatus::Outstanding
    }
}

/// Outcome of reconciling one report path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchResult {
    /// An outstanding record transitioned to completed
    Matched { canonical: String, strategy: MatchStrategy },
    /// The report resolved to a record that was already completed
    AlreadyCompleted { canonical: String, strategy: MatchStrategy },
    /// Several records fit equally well; none was touched
    Ambiguous {
        strategy: MatchStrategy,
        candidates: Vec<String>,
    },
    /// The report names nothing in the manifest
    Unmatched,
}

impl MatchResult {
    /// True only when the report completed a record
    pub fn is_new_completion(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }
}

/// Serializable snapshot of a reconciler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerState {
    pub root_prefixes: PathNormalizer,
    /// Records in manifest order
    pub records: Vec<PathRecord>,
}

/// Tracks completion of a fixed manifest against noisy report paths.
#[derive(Debug, Clone)]
pub struct Reconciler {
    normalizer: PathNormalizer,
    records: Vec<PathRecord>,
    normalized: Vec<String>,
    by_normalized: HashMap<String, usize>,
}

impl Reconciler {
    /// Build a reconciler over a manifest.
    ///
    /// Fails with `InvalidManifest` if the manifest is empty, contains an
    /// entry that normalizes to nothing, or two entries that normalize to
    /// the same path.
    pub fn new<S: AsRef<str>>(manifest: &[S], normalizer: PathNormalizer) -> Result<Self> {
        let records = manifest
            .iter()
            .map(|p| PathRecord::new(p.as_ref().to_string()))
            .collect();
        Self::build(normalizer, records).map_err(ConvergrError::InvalidManifest)
    }

    /// Restore a reconciler from a snapshot.
    pub fn from_state(state: ReconcilerState) -> Result<Self> {
        for record in &state.records {
            let consistent = match record.status {
                PathStatus::Outstanding => record.completed_at_iteration.is_none(),
                PathStatus::Completed => record.completed_at_iteration.is_some(),
            };
            if !consistent {
                return Err(ConvergrError::Checkpoint(format!(
                    "record '{}' has inconsistent completion data",
                    record.canonical_path
                )));
            }
        }
        Self::build(state.root_prefixes, state.records).map_err(ConvergrError::Checkpoint)
    }

    fn build(normalizer: PathNormalizer, records: Vec<PathRecord>) -> std::result::Result<Self, String> {
        if records.is_empty() {
            return Err("manifest is empty".to_string());
        }

        let mut normalized = Vec::with_capacity(records.len());
        let mut by_normalized = HashMap::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            let key = normalizer.normalize(&record.canonical_path);
            if key.is_empty() {
                return Err(format!("entry '{}' normalizes to an empty path", record.canonical_path));
            }
            if let Some(&previous) = by_normalized.get(&key) {
                let first: &PathRecord = &records[previous];
                return Err(format!(
                    "'{}' and '{}' both normalize to '{}'",
                    first.canonical_path, record.canonical_path, key
                ));
            }
            by_normalized.insert(key.clone(), index);
            normalized.push(key);
        }

        Ok(Self {
            normalizer,
            records,
            normalized,
            by_normalized,
        })
    }

    /// Reconcile one report path, completing at most one record.
    pub fn report_completion(&mut self, raw_path: &str, iteration: u32) -> MatchResult {
        let raw = self.normalizer.normalize(raw_path);
        if raw.is_empty() {
            debug!("Discarding empty report path {:?}", raw_path);
            return MatchResult::Unmatched;
        }

        let (strategy, index) = match self.resolve(&raw) {
            Resolution::Found(strategy, index) => (strategy, index),
            Resolution::Ambiguous(strategy, indices) => {
                let candidates: Vec<String> = indices
                    .into_iter()
                    .map(|i| self.records[i].canonical_path.clone())
                    .collect();
                debug!(
                    "Ambiguous report {:?} via {}: candidates {:?}",
                    raw_path, strategy, candidates
                );
                return MatchResult::Ambiguous { strategy, candidates };
            }
            Resolution::None => {
                debug!("Report {:?} matches nothing in the manifest", raw_path);
                return MatchResult::Unmatched;
            }
        };

        let record = &mut self.records[index];
        let canonical = record.canonical_path.clone();
        if !record.is_outstanding() {
            debug!("Report {:?} re-reports completed '{}'", raw_path, canonical);
            return MatchResult::AlreadyCompleted { canonical, strategy };
        }

        record.status = PathStatus::Completed;
        record.completed_at_iteration = Some(iteration);
        record.matched_report_path = Some(raw_path.to_string());
        debug!(
            "Completed '{}' from report {:?} via {} (iteration {})",
            canonical, raw_path, strategy, iteration
        );
        MatchResult::Matched { canonical, strategy }
    }

    fn resolve(&self, raw: &str) -> Resolution {
        if let Some(&index) = self.by_normalized.get(raw) {
            return Resolution::Found(MatchStrategy::Exact, index);
        }

        let candidates: Vec<Candidate<'_>> = self
            .normalized
            .iter()
            .zip(&self.records)
            .enumerate()
            .map(|(index, (normalized, record))| Candidate {
                index,
                normalized,
                outstanding: record.is_outstanding(),
            })
            .collect();

        // Exact was answered by the index; an ambiguous strategy ends the search.
        for strategy in MatchStrategy::ORDER.into_iter().skip(1) {
            match strategy::apply(strategy, raw, &candidates) {
                StrategyOutcome::Found(index) => return Resolution::Found(strategy, index),
                StrategyOutcome::Ambiguous(indices) => return Resolution::Ambiguous(strategy, indices),
                StrategyOutcome::NoMatch => {}
            }
        }
        Resolution::None
    }

    /// Canonical paths still outstanding, in manifest order
    pub fn outstanding(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.is_outstanding())
            .map(|r| r.canonical_path.clone())
            .collect()
    }

    pub fn outstanding_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_outstanding()).count()
    }

    pub fn completed_count(&self) -> usize {
        self.records.len() - self.outstanding_count()
    }

    pub fn is_complete(&self) -> bool {
        self.outstanding_count() == 0
    }

    /// Number of manifest entries
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false; construction rejects empty manifests
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in manifest order
    pub fn records(&self) -> &[PathRecord] {
        &self.records
    }

    /// Look up a record by its canonical path as written in the manifest
    pub fn record(&self, canonical_path: &str) -> Option<&PathRecord> {
        self.records.iter().find(|r| r.canonical_path == canonical_path)
    }

    pub fn normalizer(&self) -> &PathNormalizer {
        &self.normalizer
    }

    /// Snapshot for checkpointing
    pub fn state(&self) -> ReconcilerState {
        ReconcilerState {
            root_prefixes: self.normalizer.clone(),
            records: self.records.clone(),
        }
    }
}

enum Resolution {
    Found(MatchStrategy, usize),
    Ambiguous(MatchStrategy, Vec<usize>),
    None,
}

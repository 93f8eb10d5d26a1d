//! Matching strategies, tried in priority order by the reconciler.
//!
//! Each strategy is a pure function over the normalized report path and the
//! normalized manifest entries. Strategies never mutate records; they only
//! pick a candidate, decline as ambiguous, or find nothing.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::normalize::file_name;

/// Which strategy produced a match decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Normalized paths are identical
    Exact,
    /// One path is a separator-bounded suffix of the other
    Suffix,
    /// Final segments are identical
    FileName,
}

impl MatchStrategy {
    /// All strategies in the order they are attempted
    pub const ORDER: [MatchStrategy; 3] = [MatchStrategy::Exact, MatchStrategy::Suffix, MatchStrategy::FileName];
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::Suffix => "suffix",
            MatchStrategy::FileName => "file_name",
        };
        write!(f, "{}", name)
    }
}

/// A manifest entry as seen by the strategies
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Position in manifest order
    pub index: usize,
    /// Normalized canonical path
    pub normalized: &'a str,
    /// Whether the record is still outstanding
    pub outstanding: bool,
}

/// Result of running a single strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    /// Exactly one manifest entry selected
    Found(usize),
    /// More than one entry fits and none can be preferred
    Ambiguous(Vec<usize>),
    /// No entry fits
    NoMatch,
}

/// Run one strategy against the candidates.
pub fn apply(strategy: MatchStrategy, raw: &str, candidates: &[Candidate<'_>]) -> StrategyOutcome {
    match strategy {
        MatchStrategy::Exact => exact(raw, candidates),
        MatchStrategy::Suffix => suffix(raw, candidates),
        MatchStrategy::FileName => by_file_name(raw, candidates),
    }
}

/// Strategy 1: identical normalized paths.
pub fn exact(raw: &str, candidates: &[Candidate<'_>]) -> StrategyOutcome {
    match candidates.iter().find(|c| c.normalized == raw) {
        Some(c) => StrategyOutcome::Found(c.index),
        None => StrategyOutcome::NoMatch,
    }
}

/// Strategy 2: separator-bounded suffix in either direction.
///
/// When the report is the shorter side it must carry at least one directory
/// segment; bare file names are left to [`by_file_name`]. The candidates
/// sharing the longest suffix win. A tie is broken only if exactly one of
/// the tied entries is still outstanding.
pub fn suffix(raw: &str, candidates: &[Candidate<'_>]) -> StrategyOutcome {
    let raw_has_dir = raw.contains('/');
    let mut best_len = 0;
    let mut tied: Vec<Candidate<'_>> = Vec::new();

    for candidate in candidates {
        let canonical = candidate.normalized;
        if canonical == raw {
            continue;
        }

        let shared = if is_bounded_suffix(raw, canonical) {
            canonical.len()
        } else if raw_has_dir && is_bounded_suffix(canonical, raw) {
            raw.len()
        } else {
            continue;
        };

        if shared > best_len {
            best_len = shared;
            tied.clear();
        }
        if shared == best_len {
            tied.push(*candidate);
        }
    }

    resolve(tied)
}

/// Strategy 3: identical final segment among outstanding entries.
///
/// With no outstanding entry sharing the name, a single completed entry
/// with that name is still reported so re-reports stay idempotent.
pub fn by_file_name(raw: &str, candidates: &[Candidate<'_>]) -> StrategyOutcome {
    let name = file_name(raw);
    if name.is_empty() {
        return StrategyOutcome::NoMatch;
    }

    let (outstanding, completed): (Vec<&Candidate<'_>>, Vec<&Candidate<'_>>) = candidates
        .iter()
        .filter(|c| file_name(c.normalized) == name)
        .partition(|c| c.outstanding);

    match (outstanding.len(), completed.len()) {
        (1, _) => StrategyOutcome::Found(outstanding[0].index),
        (0, 1) => StrategyOutcome::Found(completed[0].index),
        (0, 0) => StrategyOutcome::NoMatch,
        (0, _) => StrategyOutcome::Ambiguous(indices(&completed)),
        _ => StrategyOutcome::Ambiguous(indices(&outstanding)),
    }
}

/// True when `shorter` ends `longer` and starts on a separator boundary.
pub fn is_bounded_suffix(longer: &str, shorter: &str) -> bool {
    if shorter.is_empty() || !longer.ends_with(shorter) {
        return false;
    }
    let start = longer.len() - shorter.len();
    start == 0 || longer.as_bytes()[start - 1] == b'/'
}

fn indices(entries: &[&Candidate<'_>]) -> Vec<usize> {
    entries.iter().map(|c| c.index).collect()
}

fn resolve(tied: Vec<Candidate<'_>>) -> StrategyOutcome {
    match tied.as_slice() {
        [] => StrategyOutcome::NoMatch,
        [only] => StrategyOutcome::Found(only.index),
        many => {
            let open: Vec<&Candidate<'_>> = many.iter().filter(|c| c.outstanding).collect();
            match open.as_slice() {
                [only] => StrategyOutcome::Found(only.index),
                _ => StrategyOutcome::Ambiguous(many.iter().map(|c| c.index).collect()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates<'a>(paths: &[&'a str]) -> Vec<Candidate<'a>> {
        paths
            .iter()
            .copied()
            .enumerate()
            .map(|(index, p)| Candidate {
                index,
                normalized: p,
                outstanding: true,
            })
            .collect()
    }

    #[test]
    fn test_strategy_order() {
        assert_eq!(
            MatchStrategy::ORDER,
            [MatchStrategy::Exact, MatchStrategy::Suffix, MatchStrategy::FileName]
        );
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(MatchStrategy::Exact.to_string(), "exact");
        assert_eq!(MatchStrategy::FileName.to_string(), "file_name");
    }

    #[test]
    fn test_exact_match() {
        let c = candidates(&["src/model.py", "src/utils.py"]);
        assert_eq!(exact("src/utils.py", &c), StrategyOutcome::Found(1));
        assert_eq!(exact("utils.py", &c), StrategyOutcome::NoMatch);
    }

    #[test]
    fn test_bounded_suffix() {
        assert!(is_bounded_suffix("project/src/model.py", "src/model.py"));
        assert!(is_bounded_suffix("model.py", "model.py"));
        assert!(!is_bounded_suffix("bigmodel.py", "model.py"));
        assert!(!is_bounded_suffix("src/bigmodel.py", "model.py"));
        assert!(!is_bounded_suffix("model.py", ""));
    }

    #[test]
    fn test_suffix_report_longer_than_canonical() {
        let c = candidates(&["src/model.py", "src/utils.py"]);
        assert_eq!(suffix("project/src/model.py", &c), StrategyOutcome::Found(0));
    }

    #[test]
    fn test_suffix_report_shorter_than_canonical() {
        let c = candidates(&["app/src/model.py", "app/src/utils.py"]);
        assert_eq!(suffix("src/model.py", &c), StrategyOutcome::Found(0));
    }

    #[test]
    fn test_suffix_rejects_partial_segment() {
        let c = candidates(&["lib/bigmodel.py"]);
        assert_eq!(suffix("x/model.py", &c), StrategyOutcome::NoMatch);
        let c = candidates(&["model.py"]);
        assert_eq!(suffix("src/bigmodel.py", &c), StrategyOutcome::NoMatch);
    }

    #[test]
    fn test_suffix_skips_bare_file_name_report() {
        let c = candidates(&["src/utils.py"]);
        assert_eq!(suffix("utils.py", &c), StrategyOutcome::NoMatch);
    }

    #[test]
    fn test_suffix_prefers_longest_shared_suffix() {
        let c = candidates(&["model.py", "src/model.py"]);
        assert_eq!(suffix("project/src/model.py", &c), StrategyOutcome::Found(1));
    }

    #[test]
    fn test_suffix_ambiguous_tie() {
        let c = candidates(&["a/x/util.py", "b/x/util.py"]);
        assert_eq!(suffix("x/util.py", &c), StrategyOutcome::Ambiguous(vec![0, 1]));
    }

    #[test]
    fn test_suffix_tie_broken_by_single_outstanding() {
        let mut c = candidates(&["a/x/util.py", "b/x/util.py"]);
        c[0].outstanding = false;
        assert_eq!(suffix("x/util.py", &c), StrategyOutcome::Found(1));
    }

    #[test]
    fn test_file_name_unique() {
        let c = candidates(&["src/model.py", "tests/test_model.py"]);
        assert_eq!(by_file_name("test_model.py", &c), StrategyOutcome::Found(1));
    }

    #[test]
    fn test_file_name_ambiguous_declines() {
        let c = candidates(&["a/util.py", "b/util.py"]);
        assert_eq!(by_file_name("util.py", &c), StrategyOutcome::Ambiguous(vec![0, 1]));
    }

    #[test]
    fn test_file_name_ignores_completed_when_one_outstanding() {
        let mut c = candidates(&["a/util.py", "b/util.py"]);
        c[0].outstanding = false;
        assert_eq!(by_file_name("util.py", &c), StrategyOutcome::Found(1));
    }

    #[test]
    fn test_file_name_single_completed_entry() {
        let mut c = candidates(&["a/util.py"]);
        c[0].outstanding = false;
        assert_eq!(by_file_name("util.py", &c), StrategyOutcome::Found(0));
    }

    #[test]
    fn test_file_name_no_match() {
        let c = candidates(&["a/util.py"]);
        assert_eq!(by_file_name("main.py", &c), StrategyOutcome::NoMatch);
    }

    #[test]
    fn test_apply_dispatches() {
        let c = candidates(&["src/model.py"]);
        assert_eq!(apply(MatchStrategy::Exact, "src/model.py", &c), StrategyOutcome::Found(0));
        assert_eq!(apply(MatchStrategy::Suffix, "x/src/model.py", &c), StrategyOutcome::Found(0));
        assert_eq!(apply(MatchStrategy::FileName, "model.py", &c), StrategyOutcome::Found(0));
    }
}

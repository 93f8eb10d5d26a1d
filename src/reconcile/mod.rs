//! Manifest reconciliation.
//!
//! Maps a noisy stream of produced-path reports onto a fixed manifest of
//! canonical target paths:
//! - normalize: separator, case, and root-prefix normalization
//! - strategy: the ordered exact / suffix / file-name matching pipeline
//! - reconciler: per-path completion records and the outstanding query

mod normalize;
mod reconciler;
mod strategy;

pub use normalize::{PathNormalizer, file_name, normalize};
pub use reconciler::{MatchResult, PathRecord, PathStatus, Reconciler, ReconcilerState};
pub use strategy::{MatchStrategy, is_bounded_suffix};

//! Path normalization for reconciling report paths against the manifest.
//!
//! Reports arrive with mixed separators, inconsistent capitalization, and
//! optional wrapper directories. Every path on both sides of a comparison
//! goes through the same [`PathNormalizer`] so that spelling differences
//! never decide a match.

use serde::{Deserialize, Serialize};

/// Normalizes raw path strings into a canonical comparable form.
///
/// The normalized form is lower-case, forward-slash separated, has no
/// leading, trailing, or repeated slashes, no `.` segments, and none of the
/// configured root prefixes at its start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct PathNormalizer {
    /// Root prefixes as normalized segment lists, longest first
    prefixes: Vec<Vec<String>>,
}

impl PathNormalizer {
    /// Create a normalizer that strips the given root prefixes.
    ///
    /// Prefixes are themselves normalized; prefixes that normalize to
    /// nothing (e.g. `"/"`) are dropped.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut prefixes: Vec<Vec<String>> = prefixes
            .into_iter()
            .map(|p| segments(p.as_ref()))
            .filter(|segs| !segs.is_empty())
            .collect();
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        prefixes.dedup();
        Self { prefixes }
    }

    /// The configured root prefixes in normalized form.
    pub fn prefixes(&self) -> Vec<String> {
        self.prefixes.iter().map(|p| p.join("/")).collect()
    }

    /// Normalize a raw path.
    ///
    /// A prefix is only stripped on a segment boundary, and never when it
    /// would consume the whole path.
    pub fn normalize(&self, path: &str) -> String {
        let mut segs = segments(path);

        'strip: loop {
            for prefix in &self.prefixes {
                if segs.len() > prefix.len() && segs.starts_with(prefix) {
                    segs.drain(..prefix.len());
                    continue 'strip;
                }
            }
            break;
        }

        segs.join("/")
    }
}

impl From<Vec<String>> for PathNormalizer {
    fn from(prefixes: Vec<String>) -> Self {
        Self::new(prefixes)
    }
}

impl From<PathNormalizer> for Vec<String> {
    fn from(normalizer: PathNormalizer) -> Self {
        normalizer.prefixes()
    }
}

/// Normalize a path with an ad hoc set of root prefixes.
pub fn normalize(path: &str, prefixes: &[String]) -> String {
    PathNormalizer::new(prefixes).normalize(path)
}

/// Final segment of a normalized path.
pub fn file_name(normalized: &str) -> &str {
    normalized.rsplit('/').next().unwrap_or(normalized)
}

fn segments(path: &str) -> Vec<String> {
    path.replace('\\', "/")
        .to_lowercase()
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .map(str::to_string)
        .collect()
}

//! Manifest files: one target path per line.
//!
//! Blank lines and lines starting with `#` are ignored; surrounding
//! whitespace is trimmed. Validation (emptiness, duplicates) happens when a
//! reconciler is built from the entries.

use std::fs;
use std::path::Path;

use crate::error::Result;

/// Parse manifest text into canonical target paths, in file order.
pub fn parse_manifest(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read and parse a manifest file.
pub fn load_manifest(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let content = fs::read_to_string(path.as_ref())?;
    Ok(parse_manifest(&content))
}

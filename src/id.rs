//! ID generation utilities for Convergr
//!
//! Provides run identifiers and millisecond timestamps for the audit trail.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Generate a unique run ID
///
/// Format: `{timestamp_ms}-{random_hex}`
/// Example: `1738300800123-a1b2`
pub fn generate_run_id() -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("{}-{:04x}", timestamp, random)
}

/// Check that a string has the shape produced by [`generate_run_id`].
///
/// Used to refuse run ids that would escape the checkpoint directory.
pub fn is_valid_run_id(id: &str) -> bool {
    let Some((timestamp, suffix)) = id.split_once('-') else {
        return false;
    };
    !timestamp.is_empty()
        && timestamp.chars().all(|c| c.is_ascii_digit())
        && suffix.len() == 4
        && suffix.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_returns_reasonable_timestamp() {
        let ts = now_ms();
        // Should be after 2020-01-01 and before 2100-01-01
        assert!(ts > 1577836800000);
        assert!(ts < 4102444800000);
    }

    #[test]
    fn test_generate_run_id_format() {
        let id = generate_run_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[1].len(), 4);
        assert!(parts[1].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generated_run_id_is_valid() {
        assert!(is_valid_run_id(&generate_run_id()));
    }

    #[test]
    fn test_is_valid_run_id_rejects_traversal() {
        assert!(!is_valid_run_id("../etc-abcd"));
        assert!(!is_valid_run_id("1738300800123"));
        assert!(!is_valid_run_id("1738300800123-zzzz"));
        assert!(!is_valid_run_id("-a1b2"));
        assert!(is_valid_run_id("1738300800123-a1b2"));
    }
}

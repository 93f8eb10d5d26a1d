//! Runtime configuration for a convergence run.

use std::time::Duration;

use crate::error::{ConvergrError, Result};

/// Default iterations without progress before a run is declared stalled
pub const DEFAULT_STAGNATION_THRESHOLD: u32 = 50;

/// Default absolute iteration bound
pub const DEFAULT_HARD_ITERATION_CAP: u32 = 500;

/// Default bound on a single generator call
pub const DEFAULT_GENERATOR_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for the ConvergenceLoop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Iterations without a new completion before the run stalls
    pub stagnation_threshold: u32,
    /// Absolute iteration bound, independent of progress
    pub hard_iteration_cap: u32,
    /// Bound on each generator call; a timeout counts as a failed iteration
    pub generator_timeout: Duration,
    /// Wrapper directories stripped during path normalization
    pub root_prefixes: Vec<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            stagnation_threshold: DEFAULT_STAGNATION_THRESHOLD,
            hard_iteration_cap: DEFAULT_HARD_ITERATION_CAP,
            generator_timeout: DEFAULT_GENERATOR_TIMEOUT,
            root_prefixes: vec!["generated".to_string(), "output".to_string()],
        }
    }
}

impl LoopConfig {
    pub fn stagnation_threshold(mut self, iterations: u32) -> Self {
        self.stagnation_threshold = iterations;
        self
    }

    pub fn hard_iteration_cap(mut self, iterations: u32) -> Self {
        self.hard_iteration_cap = iterations;
        self
    }

    pub fn generator_timeout(mut self, timeout: Duration) -> Self {
        self.generator_timeout = timeout;
        self
    }

    pub fn root_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.root_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Reject bounds that would make the loop unable to run or terminate.
    pub fn validate(&self) -> Result<()> {
        if self.stagnation_threshold == 0 {
            return Err(ConvergrError::Config("stagnation_threshold must be at least 1".to_string()));
        }
        if self.hard_iteration_cap == 0 {
            return Err(ConvergrError::Config("hard_iteration_cap must be at least 1".to_string()));
        }
        if self.generator_timeout.is_zero() {
            return Err(ConvergrError::Config("generator_timeout must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_config_default() {
        let config = LoopConfig::default();
        assert_eq!(config.stagnation_threshold, 50);
        assert_eq!(config.hard_iteration_cap, 500);
        assert_eq!(config.generator_timeout, Duration::from_secs(300));
        assert_eq!(config.root_prefixes, vec!["generated", "output"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_loop_config_builder() {
        let config = LoopConfig::default()
            .stagnation_threshold(3)
            .hard_iteration_cap(10)
            .generator_timeout(Duration::from_millis(50))
            .root_prefixes(["project"]);
        assert_eq!(config.stagnation_threshold, 3);
        assert_eq!(config.hard_iteration_cap, 10);
        assert_eq!(config.generator_timeout, Duration::from_millis(50));
        assert_eq!(config.root_prefixes, vec!["project"]);
    }

    #[test]
    fn test_validate_rejects_zero_bounds() {
        assert!(LoopConfig::default().stagnation_threshold(0).validate().is_err());
        assert!(LoopConfig::default().hard_iteration_cap(0).validate().is_err());
        let err = LoopConfig::default()
            .generator_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConvergrError::Config(_)));
    }
}

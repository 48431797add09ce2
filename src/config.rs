//! Solver configuration

use std::env;
use std::time::Duration;

/// Default relative tolerance for declaring two strategies tied
pub const DEFAULT_TIE_TOLERANCE: f64 = 1e-10;

/// Default cap on extended-grid bins
pub const DEFAULT_MAX_EXTENDED_BINS: usize = 20_000;

/// Configuration for a solve
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Strategies within `tie_tolerance * max(1, |best|)` of the best are tied
    pub tie_tolerance: f64,

    /// Parallelize tensor construction and per-period contraction with rayon
    pub parallel: bool,

    /// Abort the backward pass once this much time has elapsed
    pub deadline: Option<Duration>,

    /// Reject problems whose extended grid would exceed this many bins
    pub max_extended_bins: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tie_tolerance: DEFAULT_TIE_TOLERANCE,
            parallel: true,
            deadline: None,
            max_extended_bins: DEFAULT_MAX_EXTENDED_BINS,
        }
    }
}

impl SolverConfig {
    /// Defaults overridden by environment variables:
    ///   SOLVER_TIE_TOLERANCE, SOLVER_PARALLEL, SOLVER_DEADLINE_MS,
    ///   SOLVER_MAX_EXTENDED_BINS
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let tie_tolerance: f64 = env::var("SOLVER_TIE_TOLERANCE")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|t: &f64| t.is_finite() && *t >= 0.0)
            .unwrap_or(defaults.tie_tolerance);

        let parallel = env::var("SOLVER_PARALLEL")
            .map(|s| !matches!(s.as_str(), "0" | "false" | "no"))
            .unwrap_or(defaults.parallel);

        let deadline = env::var("SOLVER_DEADLINE_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .or(defaults.deadline);

        let max_extended_bins: usize = env::var("SOLVER_MAX_EXTENDED_BINS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_extended_bins);

        Self {
            tie_tolerance,
            parallel,
            deadline,
            max_extended_bins,
        }
    }

    /// Single-threaded variant, useful for reproducible timing
    pub fn serial() -> Self {
        Self {
            parallel: false,
            ..Default::default()
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SolverConfig::default();
        assert!(config.parallel);
        assert!(config.deadline.is_none());
        assert_eq!(config.max_extended_bins, DEFAULT_MAX_EXTENDED_BINS);
    }

    #[test]
    fn test_builders() {
        let config = SolverConfig::serial().with_deadline(Duration::from_millis(250));
        assert!(!config.parallel);
        assert_eq!(config.deadline, Some(Duration::from_millis(250)));
    }
}

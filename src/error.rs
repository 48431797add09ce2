//! Error types for the solver
//!
//! The core assumes a structurally valid problem; these variants cover the
//! few conditions it can still hit (oversized grids, cancellation, bad seeds)
//! plus the I/O surface of the problem loaders.

use thiserror::Error;

/// Result alias used throughout the crate
pub type SolverResult<T> = Result<T, SolverError>;

/// Errors raised while building, solving, or post-processing a problem
#[derive(Error, Debug)]
pub enum SolverError {
    /// The problem failed a structural precondition
    #[error("Invalid problem: {reason}")]
    InvalidProblem {
        /// Which precondition failed
        reason: String,
    },

    /// The extended grid would exceed the configured bin limit
    #[error("Extended grid has {bins} bins, above the configured limit of {limit}")]
    GridTooLarge {
        /// Bins the extension would produce
        bins: usize,
        /// Configured maximum
        limit: usize,
    },

    /// The cancellation token was triggered
    #[error("Solve cancelled before period {period}")]
    Cancelled {
        /// Period the backward pass was about to compute
        period: usize,
    },

    /// The solve deadline passed
    #[error("Solve deadline exceeded before period {period} ({elapsed_ms} ms elapsed)")]
    DeadlineExceeded {
        /// Period the backward pass was about to compute
        period: usize,
        /// Milliseconds elapsed since the solve started
        elapsed_ms: u64,
    },

    /// A trajectory seed does not address a cell of the original grid
    #[error("Seed (period {period}, wealth index {wealth_index}) is outside the {periods} x {bins} grid")]
    SeedOutOfRange {
        /// Requested seed period
        period: usize,
        /// Requested seed wealth index
        wealth_index: usize,
        /// Number of periods in the problem
        periods: usize,
        /// Number of original wealth bins
        bins: usize,
    },

    /// A requested confidence level is not a probability
    #[error("Invalid confidence level: {value}")]
    InvalidProbability {
        /// The offending value
        value: f64,
    },

    /// Reading or writing a file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON problem document could not be parsed or written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A CSV file could not be parsed or written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl SolverError {
    /// Shorthand for [`SolverError::InvalidProblem`]
    pub fn invalid(reason: impl Into<String>) -> Self {
        SolverError::InvalidProblem {
            reason: reason.into(),
        }
    }
}

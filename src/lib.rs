//! Dynamic Allocation - Finite-horizon investment strategy optimizer
//!
//! This library provides:
//! - Wealth grid extension with a bankruptcy sink and a geometric upper tail
//! - Banded transition probabilities for Gaussian return strategies
//! - Backward induction for the utility-maximizing strategy per (period, wealth)
//! - Neighbour-based resolution of tied strategies
//! - Forward propagation of the optimal policy and confidence bands
//! - JSON/CSV problem files and CSV export

pub mod config;
pub mod error;
pub mod problem;
pub mod report;
pub mod solver;
pub mod trajectory;

// Re-export commonly used types
pub use config::SolverConfig;
pub use error::{SolverError, SolverResult};
pub use problem::{Problem, Strategy, UtilityFunction, WealthGrid};
pub use solver::{CancellationToken, ExtendedSolution, PolicyCell, Solution, Solver};
pub use trajectory::{QuantileTrace, Trajectory};

//! Problem definition: wealth grid, strategies, cashflows and terminal utility

mod grid;
mod strategy;
mod utility;
pub mod loader;

pub use grid::WealthGrid;
pub use strategy::{ReturnDistribution, Strategy, Support, DEGENERATE_HALF_WIDTH, SUPPORT_SIGMAS};
pub use utility::{CustomUtility, UtilityFunction};
pub use loader::ProblemFile;

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};

/// A fully specified allocation problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    /// Caller's wealth grid
    pub grid: WealthGrid,

    /// Number of decision periods
    pub periods: usize,

    /// Candidate strategies, indexed by position
    pub strategies: Vec<Strategy>,

    /// Deterministic amount added after each period's return (one per period)
    pub cashflows: Vec<f64>,

    /// Utility of terminal wealth
    pub utility: UtilityFunction,
}

impl Problem {
    pub fn new(
        grid: WealthGrid,
        periods: usize,
        strategies: Vec<Strategy>,
        cashflows: Vec<f64>,
        utility: UtilityFunction,
    ) -> Self {
        Self {
            grid,
            periods,
            strategies,
            cashflows,
            utility,
        }
    }

    /// The starting scenario of the interactive planner: ten years, saving
    /// 40k a year for five years then drawing 40k a year, with a cash
    /// strategy and four equity mixes.
    pub fn default_example() -> Self {
        let boundaries: Vec<f64> = (0..=40).map(|k| k as f64 * 10_000.0).collect();
        let values = boundaries.iter().map(|b| b + 5_000.0).collect();
        let grid = WealthGrid::new(boundaries, values, 10_000.0);

        let mut cashflows = vec![40_000.0; 5];
        cashflows.extend(std::iter::repeat(-40_000.0).take(5));

        Self {
            grid,
            periods: 10,
            strategies: vec![
                Strategy::gaussian("cash", 0.01, 0.0),
                Strategy::gaussian("e_25", 0.02, 0.05),
                Strategy::gaussian("e_50", 0.03, 0.1),
                Strategy::gaussian("e_75", 0.04, 0.15),
                Strategy::gaussian("e_100", 0.05, 0.2),
            ],
            cashflows,
            utility: UtilityFunction::LogWithTarget {
                target: 100_000.0,
                bonus: 1.0,
            },
        }
    }

    /// Structural preconditions the solver relies on
    pub fn validate(&self) -> SolverResult<()> {
        self.grid.validate()?;

        if self.periods == 0 {
            return Err(SolverError::invalid("at least one period is required"));
        }
        if self.strategies.is_empty() {
            return Err(SolverError::invalid("at least one strategy is required"));
        }
        if self.cashflows.len() != self.periods {
            return Err(SolverError::invalid(format!(
                "{} cashflows supplied for {} periods",
                self.cashflows.len(),
                self.periods
            )));
        }
        if let Some(cf) = self.cashflows.iter().find(|cf| !cf.is_finite()) {
            return Err(SolverError::invalid(format!("cashflow {} is not finite", cf)));
        }

        for strategy in &self.strategies {
            let finite = strategy.location().is_finite()
                && strategy.scale().is_finite()
                && strategy.support.low.is_finite()
                && strategy.support.high.is_finite();
            if !finite || strategy.scale() < 0.0 || strategy.support.high < strategy.support.low {
                return Err(SolverError::invalid(format!(
                    "strategy '{}' has invalid parameters",
                    strategy.name
                )));
            }
        }

        Ok(())
    }

    /// Strategy names in index order
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name.as_str()).collect()
    }
}

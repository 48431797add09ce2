//! Dynamic-programming solver
//!
//! `Solver::solve` runs the full pipeline: grid extension, banded transition
//! tensor, backward induction, ambiguity resolution and clipping back to the
//! caller's grid. The extended intermediate results are kept in the
//! `Solution` so trajectories can be propagated afterwards.

mod ambiguity;
mod backward;
mod cancel;
mod clip;
mod contraction;
mod extend;
mod transition;

pub use ambiguity::{resolve_ambiguity, resolve_row};
pub use cancel::CancellationToken;
pub use clip::{clip_rows, transpose};
pub use contraction::{
    default_backend, ContractionError, ParallelContraction, PeriodContraction, SerialContraction,
};
pub use extend::{extend_wealth_grid, ExtendedGrid, FALLBACK_COARSE_STEP};
pub use transition::{Band, CashflowTransitions, TransitionTensor};

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::SolverConfig;
use crate::error::SolverResult;
use crate::problem::Problem;
use backward::{terminal_utility, BackwardInduction, BackwardPass};
use cancel::PeriodGuard;

/// Optimal decision for one (period, wealth) cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicyCell {
    /// Index of the single best strategy
    Determined(usize),
    /// Several strategies are within tolerance of the best
    Ambiguous,
}

impl PolicyCell {
    pub fn is_determined(&self) -> bool {
        matches!(self, PolicyCell::Determined(_))
    }

    pub fn strategy(&self) -> Option<usize> {
        match *self {
            PolicyCell::Determined(s) => Some(s),
            PolicyCell::Ambiguous => None,
        }
    }
}

/// Extended-grid results needed for forward simulation
#[derive(Debug, Clone)]
pub struct ExtendedSolution {
    /// Extended wealth grid
    pub grid: ExtendedGrid,

    /// Transitions for every strategy
    pub tensor: TransitionTensor,

    /// Strategy followed in each `[period][bin]` cell; still-ambiguous cells
    /// use the lowest-index maximiser
    selected: Vec<usize>,

    periods: usize,
}

impl ExtendedSolution {
    pub fn periods(&self) -> usize {
        self.periods
    }

    pub fn bins(&self) -> usize {
        self.grid.bins()
    }

    /// Strategy followed from extended `bin` in `period`
    pub fn selected_strategy(&self, period: usize, bin: usize) -> usize {
        self.selected[period * self.bins() + bin]
    }
}

/// Result of a solve, clipped to the caller's grid
#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    /// `[period][wealth]`, `periods` rows
    pub optimal_strategies: Vec<Vec<PolicyCell>>,

    /// `[period][wealth]`, `periods + 1` rows (terminal row last)
    pub expected_utilities: Vec<Vec<f64>>,

    /// Cells of `optimal_strategies` still ambiguous after resolution
    pub ambiguous_cells: usize,

    #[serde(skip)]
    pub extended: ExtendedSolution,
}

impl Solution {
    pub fn periods(&self) -> usize {
        self.optimal_strategies.len()
    }

    pub fn wealth_bins(&self) -> usize {
        self.optimal_strategies.first().map_or(0, |row| row.len())
    }

    /// Policy as `[wealth][period]`, the heat-map layout
    pub fn policy_by_wealth(&self) -> Vec<Vec<PolicyCell>> {
        transpose(&self.optimal_strategies)
    }

    pub fn policy_at(&self, period: usize, wealth_index: usize) -> Option<PolicyCell> {
        self.optimal_strategies
            .get(period)
            .and_then(|row| row.get(wealth_index))
            .copied()
    }
}

/// Finite-horizon allocation solver
#[derive(Debug)]
pub struct Solver {
    config: SolverConfig,
    backend: Box<dyn PeriodContraction>,
    token: Option<CancellationToken>,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl Solver {
    pub fn new(config: SolverConfig) -> Self {
        let backend = default_backend(config.parallel);
        Self {
            config,
            backend,
            token: None,
        }
    }

    /// Abort the solve when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Replace the per-period contraction kernel
    pub fn with_backend(mut self, backend: Box<dyn PeriodContraction>) -> Self {
        self.backend = backend;
        self
    }

    pub fn solve(&self, problem: &Problem) -> SolverResult<Solution> {
        let started = Instant::now();
        problem.validate()?;
        let guard = PeriodGuard::new(self.token.clone(), self.config.deadline);

        let grid = extend_wealth_grid(problem, self.config.max_extended_bins)?;
        let bins = grid.bins();
        let tensor = TransitionTensor::build(
            &grid,
            &problem.strategies,
            &problem.cashflows,
            self.config.parallel,
        );
        log::debug!("Tensor built in {:.2?}", started.elapsed());

        let induction = BackwardInduction {
            tensor: &tensor,
            backend: self.backend.as_ref(),
            tie_tolerance: self.config.tie_tolerance,
            parallel: self.config.parallel,
        };
        let BackwardPass {
            utility,
            mut policy,
            first_best,
        } = induction.run(terminal_utility(&grid, &problem.utility), &guard)?;

        let unresolved = resolve_ambiguity(&mut policy, bins, self.config.parallel);
        log::debug!("{} extended cells ambiguous after resolution", unresolved);

        let selected = policy
            .iter()
            .zip(&first_best)
            .map(|(cell, &best)| cell.strategy().unwrap_or(best))
            .collect();

        let optimal_strategies = clip_rows(&policy, bins, &grid.original);
        let expected_utilities = clip_rows(&utility, bins, &grid.original);
        let ambiguous_cells = optimal_strategies
            .iter()
            .flatten()
            .filter(|c| !c.is_determined())
            .count();
        if ambiguous_cells > 0 {
            log::warn!("{} policy cells remain ambiguous", ambiguous_cells);
        }

        log::info!(
            "Solved {} periods over {} bins ({} extended) in {:.2?}",
            problem.periods,
            grid.original_len(),
            bins,
            started.elapsed()
        );

        Ok(Solution {
            optimal_strategies,
            expected_utilities,
            ambiguous_cells,
            extended: ExtendedSolution {
                grid,
                tensor,
                selected,
                periods: problem.periods,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolverError;
    use crate::problem::{Strategy, UtilityFunction, WealthGrid};
    use approx::assert_relative_eq;
    use std::time::Duration;

    fn small_problem() -> Problem {
        Problem::new(
            WealthGrid::uniform(0.0, 50.0, 10.0).unwrap(),
            3,
            vec![
                Strategy::gaussian("cash", 0.0, 0.0),
                Strategy::gaussian("risky", 0.05, 0.2),
            ],
            vec![5.0, -5.0, 0.0],
            UtilityFunction::Log,
        )
    }

    /// Expected utility of `strategy` from `value`, summing over every bin
    fn dense_expectation(
        grid: &ExtendedGrid,
        strategy: &Strategy,
        value: f64,
        cashflow: f64,
        next: &[f64],
    ) -> f64 {
        let support = strategy.support;
        let cdf = |b: f64| {
            let r = ((b - cashflow) / value - 1.0).clamp(support.low, support.high);
            strategy.cdf(r)
        };
        (0..grid.bins())
            .map(|j| (cdf(grid.boundaries[j + 1]) - cdf(grid.boundaries[j])).max(0.0) * next[j])
            .sum()
    }

    #[test]
    fn test_bellman_optimality_by_brute_force() {
        let problem = small_problem();
        let grid = extend_wealth_grid(&problem, 10_000).unwrap();
        let tensor = TransitionTensor::build(&grid, &problem.strategies, &problem.cashflows, false);
        let pass = BackwardInduction {
            tensor: &tensor,
            backend: &SerialContraction,
            tie_tolerance: 1e-10,
            parallel: false,
        }
        .run(
            terminal_utility(&grid, &problem.utility),
            &PeriodGuard::new(None, None),
        )
        .unwrap();

        let bins = grid.bins();
        for p in 0..problem.periods {
            let next = &pass.utility[(p + 1) * bins..(p + 2) * bins];
            assert_eq!(pass.utility[p * bins], 0.0);
            for i in 1..bins {
                let scores: Vec<f64> = problem
                    .strategies
                    .iter()
                    .map(|s| dense_expectation(&grid, s, grid.values[i], problem.cashflows[p], next))
                    .collect();
                let best = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                assert_relative_eq!(
                    pass.utility[p * bins + i],
                    best,
                    epsilon = 1e-9,
                    max_relative = 1e-9
                );
                let chosen = pass.first_best[p * bins + i];
                assert_relative_eq!(scores[chosen], best, epsilon = 1e-9, max_relative = 1e-9);
            }
        }
    }

    #[test]
    fn test_clipped_dimensions() {
        let problem = Problem::default_example();
        let solution = Solver::default().solve(&problem).unwrap();

        assert_eq!(solution.optimal_strategies.len(), 10);
        assert_eq!(solution.expected_utilities.len(), 11);
        assert!(solution.optimal_strategies.iter().all(|r| r.len() == 41));
        assert!(solution.expected_utilities.iter().all(|r| r.len() == 41));
        assert_eq!(solution.periods(), 10);
        assert_eq!(solution.wealth_bins(), 41);

        let by_wealth = solution.policy_by_wealth();
        assert_eq!(by_wealth.len(), 41);
        assert_eq!(by_wealth[7][3], solution.optimal_strategies[3][7]);
    }

    #[test]
    fn test_terminal_row_is_utility_of_values() {
        let problem = Problem::default_example();
        let solution = Solver::default().solve(&problem).unwrap();
        let terminal = &solution.expected_utilities[problem.periods];
        for (k, &w) in problem.grid.values.iter().enumerate() {
            assert_eq!(terminal[k], problem.utility.evaluate(w));
        }
    }

    #[test]
    fn test_single_deterministic_strategy() {
        let problem = Problem::new(
            WealthGrid::uniform(0.0, 100.0, 10.0).unwrap(),
            1,
            vec![Strategy::gaussian("cash", 0.01, 0.0)],
            vec![0.0],
            UtilityFunction::Linear,
        );
        let solution = Solver::new(SolverConfig::serial()).solve(&problem).unwrap();
        let grid = &solution.extended.grid;

        assert_eq!(solution.ambiguous_cells, 0);
        assert!(solution.optimal_strategies[0]
            .iter()
            .all(|c| *c == PolicyCell::Determined(0)));

        for (k, &v) in problem.grid.values.iter().enumerate() {
            let landing = grid.bin_of(v * 1.01);
            assert_eq!(solution.expected_utilities[0][k], grid.values[landing]);
        }
    }

    #[test]
    fn test_boundary_landing_uses_upper_bin() {
        let problem = Problem::new(
            WealthGrid::uniform(0.0, 100.0, 10.0).unwrap(),
            1,
            vec![Strategy::gaussian("cash", 0.0, 0.0)],
            vec![5.0],
            UtilityFunction::Linear,
        );
        let solution = Solver::new(SolverConfig::serial()).solve(&problem).unwrap();
        // value 15 plus 5 lands on 20, the bin [20, 30) valued 25
        assert_eq!(solution.expected_utilities[0][1], 25.0);
    }

    #[test]
    fn test_serial_and_parallel_solves_agree() {
        let problem = Problem::default_example();
        let serial = Solver::new(SolverConfig::serial()).solve(&problem).unwrap();
        let parallel = Solver::default().solve(&problem).unwrap();
        assert_eq!(serial.expected_utilities, parallel.expected_utilities);
        assert_eq!(serial.optimal_strategies, parallel.optimal_strategies);
    }

    #[derive(Debug)]
    struct FailingContraction;

    impl PeriodContraction for FailingContraction {
        fn name(&self) -> &str {
            "failing"
        }

        fn contract(
            &self,
            _transitions: &CashflowTransitions,
            _next_utility: &[f64],
            _expected: &mut [f64],
        ) -> Result<(), ContractionError> {
            Err(ContractionError::Backend {
                backend: "failing".to_string(),
                reason: "device unavailable".to_string(),
            })
        }
    }

    #[test]
    fn test_failing_backend_falls_back_to_cpu() {
        let problem = small_problem();
        let reference = Solver::new(SolverConfig::serial()).solve(&problem).unwrap();
        let fallback = Solver::new(SolverConfig::serial())
            .with_backend(Box::new(FailingContraction))
            .solve(&problem)
            .unwrap();
        assert_eq!(reference.expected_utilities, fallback.expected_utilities);
        assert_eq!(reference.optimal_strategies, fallback.optimal_strategies);
    }

    #[test]
    fn test_cancellation_and_deadline() {
        let problem = small_problem();

        let token = CancellationToken::new();
        token.cancel();
        let err = Solver::default()
            .with_cancellation(token)
            .solve(&problem)
            .unwrap_err();
        assert!(matches!(err, SolverError::Cancelled { period: 2 }));

        let config = SolverConfig::default().with_deadline(Duration::ZERO);
        let err = Solver::new(config).solve(&problem).unwrap_err();
        assert!(matches!(err, SolverError::DeadlineExceeded { period: 2, .. }));
    }

    #[test]
    fn test_invalid_problem_is_rejected() {
        let mut problem = small_problem();
        problem.cashflows.push(1.0);
        let err = Solver::default().solve(&problem).unwrap_err();
        assert!(matches!(err, SolverError::InvalidProblem { .. }));
    }

    #[test]
    fn test_policy_cell_json() {
        let cells = vec![PolicyCell::Determined(3), PolicyCell::Ambiguous];
        let json = serde_json::to_string(&cells).unwrap();
        assert_eq!(json, "[3,null]");
        let back: Vec<PolicyCell> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cells);
    }

    #[test]
    fn test_default_example_is_finite() {
        let problem = Problem::default_example();
        let solution = Solver::default().solve(&problem).unwrap();
        assert!(solution
            .expected_utilities
            .iter()
            .flatten()
            .all(|u| u.is_finite()));
        assert!(solution.ambiguous_cells < solution.periods() * solution.wealth_bins());
    }
}

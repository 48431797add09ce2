//! Pushing a point mass forward through the policy-induced transitions

use super::Trajectory;
use crate::error::{SolverError, SolverResult};
use crate::solver::ExtendedSolution;

impl ExtendedSolution {
    /// Distribution of wealth when starting in `wealth_index` of the caller's
    /// grid at `period` and following the optimal policy
    pub fn trajectories(&self, period: usize, wealth_index: usize) -> SolverResult<Trajectory> {
        let periods = self.periods();
        let original = self.grid.original.clone();

        if period >= periods || wealth_index >= original.len() {
            return Err(SolverError::SeedOutOfRange {
                period,
                wealth_index,
                periods,
                bins: original.len(),
            });
        }

        let bins = self.bins();
        let mut rows = vec![0.0; (periods + 1) * bins];
        let seed = original.start + wealth_index;
        rows[period * bins + seed] = 1.0;

        for p in period..periods {
            let (head, tail) = rows.split_at_mut((p + 1) * bins);
            let current = &head[p * bins..];
            let next = &mut tail[..bins];

            for (i, &mass) in current.iter().enumerate() {
                if mass == 0.0 {
                    continue;
                }
                let band = self.tensor.band(p, i, self.selected_strategy(p, i));
                for (k, prob) in band.probabilities.iter().enumerate() {
                    next[band.start + k] += mass * prob;
                }
            }
        }

        log::debug!(
            "Propagated seed (period {}, wealth index {}) over {} periods",
            period,
            wealth_index,
            periods - period
        );

        Ok(Trajectory {
            bins,
            start_period: period,
            rows,
            window: original,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SolverConfig;
    use crate::error::SolverError;
    use crate::problem::{Problem, Strategy, UtilityFunction, WealthGrid};
    use crate::solver::Solver;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rows_conserve_unit_mass() {
        let problem = Problem::default_example();
        let solution = Solver::default().solve(&problem).unwrap();
        let trajectory = solution.extended.trajectories(0, 10).unwrap();

        assert_eq!(trajectory.rows(), problem.periods + 1);
        assert_eq!(trajectory.bins(), solution.extended.bins());
        for p in 0..=problem.periods {
            assert_abs_diff_eq!(trajectory.mass(p), 1.0, epsilon = 1e-6);
            assert!(trajectory.row(p).iter().all(|m| *m >= 0.0));
        }
    }

    #[test]
    fn test_rows_before_seed_are_empty() {
        let problem = Problem::default_example();
        let solution = Solver::default().solve(&problem).unwrap();
        let trajectory = solution.extended.trajectories(4, 20).unwrap();

        assert_eq!(trajectory.start_period(), 4);
        for p in 0..4 {
            assert_eq!(trajectory.mass(p), 0.0);
        }
        // extended index is shifted by the bankruptcy bin
        assert_eq!(trajectory.row(4)[21], 1.0);
        assert_eq!(trajectory.original_index(21), Some(20));
        assert_eq!(trajectory.original_index(0), None);
    }

    #[test]
    fn test_deterministic_path() {
        let problem = Problem::new(
            WealthGrid::uniform(0.0, 100.0, 10.0).unwrap(),
            2,
            vec![Strategy::gaussian("cash", 0.0, 0.0)],
            vec![10.0, 10.0],
            UtilityFunction::Linear,
        );
        let solution = Solver::new(SolverConfig::serial()).solve(&problem).unwrap();
        let trajectory = solution.extended.trajectories(0, 2).unwrap();

        // 25 -> 35 -> 45, extended bins 3 -> 4 -> 5
        assert_eq!(trajectory.row(0)[3], 1.0);
        assert_eq!(trajectory.row(1)[4], 1.0);
        assert_eq!(trajectory.row(2)[5], 1.0);
    }

    #[test]
    fn test_seed_out_of_range() {
        let problem = Problem::default_example();
        let solution = Solver::default().solve(&problem).unwrap();

        let err = solution.extended.trajectories(10, 0).unwrap_err();
        assert!(matches!(err, SolverError::SeedOutOfRange { period: 10, .. }));
        let err = solution.extended.trajectories(0, 41).unwrap_err();
        assert!(matches!(err, SolverError::SeedOutOfRange { wealth_index: 41, .. }));
    }
}

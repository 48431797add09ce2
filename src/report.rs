//! CSV export of solutions and trajectory bands

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::SolverResult;
use crate::problem::Problem;
use crate::solver::{ExtendedGrid, PolicyCell, Solution};
use crate::trajectory::QuantileTrace;

/// One `(period, wealth)` cell of the solved policy
#[derive(Debug, Clone, Serialize)]
pub struct PolicyRow {
    pub period: usize,
    pub wealth: f64,
    /// Strategy name, or `ambiguous`
    pub strategy: String,
    pub expected_utility: f64,
}

/// One period of a confidence band, bounds as bin values
#[derive(Debug, Clone, Serialize)]
pub struct QuantileRow {
    pub probability: f64,
    pub period: usize,
    pub lower_wealth: f64,
    pub upper_wealth: f64,
}

/// Flatten a solution into long-format rows, terminal period included
pub fn policy_rows(problem: &Problem, solution: &Solution) -> Vec<PolicyRow> {
    let names = problem.strategy_names();
    let mut rows = Vec::with_capacity(solution.expected_utilities.len() * problem.grid.len());

    for (period, utilities) in solution.expected_utilities.iter().enumerate() {
        for (k, &expected_utility) in utilities.iter().enumerate() {
            let strategy = match solution.policy_at(period, k) {
                Some(PolicyCell::Determined(s)) => names[s].to_string(),
                Some(PolicyCell::Ambiguous) => "ambiguous".to_string(),
                // Terminal row has no decision
                None => String::new(),
            };
            rows.push(PolicyRow {
                period,
                wealth: problem.grid.values[k],
                strategy,
                expected_utility,
            });
        }
    }

    rows
}

pub fn quantile_rows(grid: &ExtendedGrid, traces: &[QuantileTrace]) -> Vec<QuantileRow> {
    traces
        .iter()
        .flat_map(|trace| {
            trace
                .periods
                .iter()
                .zip(trace.lower.iter().zip(&trace.upper))
                .map(move |(&period, (&lo, &hi))| QuantileRow {
                    probability: trace.probability,
                    period,
                    lower_wealth: grid.values[lo],
                    upper_wealth: grid.values[hi],
                })
        })
        .collect()
}

/// Serialize `rows` as CSV with a header line
pub fn write_rows<W: Write, T: Serialize>(writer: W, rows: &[T]) -> SolverResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_rows_to_path<T: Serialize>(path: &Path, rows: &[T]) -> SolverResult<()> {
    let file = File::create(path)?;
    write_rows(file, rows)?;
    log::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{Strategy, UtilityFunction, WealthGrid};
    use crate::solver::Solver;

    fn solved() -> (Problem, Solution) {
        let problem = Problem::new(
            WealthGrid::uniform(0.0, 30.0, 10.0).unwrap(),
            2,
            vec![Strategy::gaussian("cash", 0.01, 0.0)],
            vec![0.0, 0.0],
            UtilityFunction::Linear,
        );
        let solution = Solver::default().solve(&problem).unwrap();
        (problem, solution)
    }

    #[test]
    fn test_policy_rows_cover_every_cell() {
        let (problem, solution) = solved();
        let rows = policy_rows(&problem, &solution);

        assert_eq!(rows.len(), 3 * 4);
        assert_eq!(rows[0].strategy, "cash");
        assert_eq!(rows[0].wealth, 5.0);
        assert_eq!(rows.last().unwrap().period, 2);
        assert!(rows.last().unwrap().strategy.is_empty());
    }

    #[test]
    fn test_csv_output() {
        let (problem, solution) = solved();
        let mut buffer = Vec::new();
        write_rows(&mut buffer, &policy_rows(&problem, &solution)).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("period,wealth,strategy,expected_utility"));
        assert!(lines.next().unwrap().starts_with("0,5.0,cash,"));
    }

    #[test]
    fn test_quantile_rows_use_bin_values() {
        let (_, solution) = solved();
        let trajectory = solution.extended.trajectories(0, 1).unwrap();
        let traces = trajectory.quantiles(&[0.9], 0).unwrap();
        let rows = quantile_rows(&solution.extended.grid, &traces);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].lower_wealth, 15.0);
        assert_eq!(rows[0].upper_wealth, 15.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bands.csv");
        write_rows_to_path(&path, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("probability,period,lower_wealth,upper_wealth"));
    }
}

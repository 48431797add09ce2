//! Per-period expectation kernels
//!
//! A contraction turns one period's banded transitions and the next period's
//! utility row into the `bins x strategies` matrix of expected utilities.
//! Backends are pluggable; the solver falls back to the CPU kernel whenever a
//! backend reports an error.

use std::fmt;

use rayon::prelude::*;
use thiserror::Error;

use super::transition::CashflowTransitions;

/// Failure reported by a contraction backend
#[derive(Error, Debug)]
pub enum ContractionError {
    /// Buffers do not match the transition shape
    #[error("Shape mismatch: expected {expected} entries, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// The backend itself failed
    #[error("Contraction backend '{backend}' failed: {reason}")]
    Backend { backend: String, reason: String },
}

/// Computes `expected[i * S + s] = Σ_j P[i][s][j] · next[j]`
pub trait PeriodContraction: Send + Sync + fmt::Debug {
    /// Short name for log messages
    fn name(&self) -> &str;

    fn contract(
        &self,
        transitions: &CashflowTransitions,
        next_utility: &[f64],
        expected: &mut [f64],
    ) -> Result<(), ContractionError>;
}

/// Single-threaded kernel
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialContraction;

/// Rayon kernel, one task per origin bin
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelContraction;

impl PeriodContraction for SerialContraction {
    fn name(&self) -> &str {
        "serial"
    }

    fn contract(
        &self,
        transitions: &CashflowTransitions,
        next_utility: &[f64],
        expected: &mut [f64],
    ) -> Result<(), ContractionError> {
        check_shape(transitions, next_utility, expected)?;
        contract_cpu(transitions, next_utility, expected, false);
        Ok(())
    }
}

impl PeriodContraction for ParallelContraction {
    fn name(&self) -> &str {
        "parallel"
    }

    fn contract(
        &self,
        transitions: &CashflowTransitions,
        next_utility: &[f64],
        expected: &mut [f64],
    ) -> Result<(), ContractionError> {
        check_shape(transitions, next_utility, expected)?;
        contract_cpu(transitions, next_utility, expected, true);
        Ok(())
    }
}

/// Backend matching the `parallel` switch of a config
pub fn default_backend(parallel: bool) -> Box<dyn PeriodContraction> {
    if parallel {
        Box::new(ParallelContraction)
    } else {
        Box::new(SerialContraction)
    }
}

fn check_shape(
    transitions: &CashflowTransitions,
    next_utility: &[f64],
    expected: &mut [f64],
) -> Result<(), ContractionError> {
    if next_utility.len() != transitions.bins() {
        return Err(ContractionError::ShapeMismatch {
            expected: transitions.bins(),
            actual: next_utility.len(),
        });
    }
    let pairs = transitions.bins() * transitions.strategies();
    if expected.len() != pairs {
        return Err(ContractionError::ShapeMismatch {
            expected: pairs,
            actual: expected.len(),
        });
    }
    Ok(())
}

/// CPU kernel; shapes must already match
pub(crate) fn contract_cpu(
    transitions: &CashflowTransitions,
    next_utility: &[f64],
    expected: &mut [f64],
    parallel: bool,
) {
    let strategies = transitions.strategies();
    if strategies == 0 {
        return;
    }

    let fill_row = |(bin, row): (usize, &mut [f64])| {
        for (s, out) in row.iter_mut().enumerate() {
            *out = transitions.band(bin, s).expectation(next_utility);
        }
    };

    if parallel {
        expected
            .par_chunks_mut(strategies)
            .enumerate()
            .for_each(fill_row);
    } else {
        expected.chunks_mut(strategies).enumerate().for_each(fill_row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Problem;
    use crate::solver::extend::extend_wealth_grid;
    use crate::solver::transition::TransitionTensor;

    fn tensor() -> TransitionTensor {
        let problem = Problem::default_example();
        let grid = extend_wealth_grid(&problem, 10_000).unwrap();
        TransitionTensor::build(&grid, &problem.strategies, &problem.cashflows, false)
    }

    #[test]
    fn test_serial_and_parallel_agree() {
        let tensor = tensor();
        let transitions = tensor.period(0);
        let next: Vec<f64> = (0..tensor.bins()).map(|j| (j as f64).sqrt()).collect();
        let pairs = tensor.bins() * tensor.strategies();

        let mut serial = vec![0.0; pairs];
        let mut parallel = vec![0.0; pairs];
        SerialContraction.contract(transitions, &next, &mut serial).unwrap();
        ParallelContraction.contract(transitions, &next, &mut parallel).unwrap();
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_constant_utility_is_preserved() {
        let tensor = tensor();
        let next = vec![2.0; tensor.bins()];
        let mut expected = vec![0.0; tensor.bins() * tensor.strategies()];
        ParallelContraction
            .contract(tensor.period(3), &next, &mut expected)
            .unwrap();
        for e in expected {
            assert!((e - 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_shape_mismatch_is_reported() {
        let tensor = tensor();
        let next = vec![0.0; tensor.bins() - 1];
        let mut expected = vec![0.0; tensor.bins() * tensor.strategies()];
        let err = SerialContraction
            .contract(tensor.period(0), &next, &mut expected)
            .unwrap_err();
        assert!(matches!(err, ContractionError::ShapeMismatch { .. }));
    }
}

//! Backward induction over the extended grid

use rayon::prelude::*;

use super::cancel::PeriodGuard;
use super::contraction::{contract_cpu, PeriodContraction};
use super::extend::ExtendedGrid;
use super::transition::TransitionTensor;
use super::PolicyCell;
use crate::error::SolverResult;
use crate::problem::UtilityFunction;

/// Raw output of the backward pass, all rows over the extended grid
#[derive(Debug, Clone)]
pub(crate) struct BackwardPass {
    /// `(periods + 1) x bins`, terminal row last
    pub utility: Vec<f64>,
    /// `periods x bins`
    pub policy: Vec<PolicyCell>,
    /// Lowest-index maximiser per cell, `periods x bins`
    pub first_best: Vec<usize>,
}

/// Utility of every extended value, with the bankruptcy bin pinned to zero
pub(crate) fn terminal_utility(grid: &ExtendedGrid, utility: &UtilityFunction) -> Vec<f64> {
    let mut row: Vec<f64> = grid.values.iter().map(|&w| utility.evaluate(w)).collect();
    if let Some(first) = row.first_mut() {
        *first = 0.0;
    }
    row
}

/// Pick the best strategy from one cell's expected utilities
///
/// Returns the maximum, the policy cell (ambiguous when another strategy is
/// within `tie_tolerance * max(1, |max|)`) and the lowest-index maximiser.
pub(crate) fn select(scores: &[f64], tie_tolerance: f64) -> (f64, PolicyCell, usize) {
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (s, &score) in scores.iter().enumerate() {
        if score > best_score {
            best = s;
            best_score = score;
        }
    }

    let tolerance = tie_tolerance * best_score.abs().max(1.0);
    let tied = scores
        .iter()
        .filter(|&&score| score == best_score || best_score - score <= tolerance)
        .count();

    let cell = if tied > 1 {
        PolicyCell::Ambiguous
    } else {
        PolicyCell::Determined(best)
    };
    (best_score, cell, best)
}

pub(crate) struct BackwardInduction<'a> {
    pub tensor: &'a TransitionTensor,
    pub backend: &'a dyn PeriodContraction,
    pub tie_tolerance: f64,
    pub parallel: bool,
}

impl<'a> BackwardInduction<'a> {
    pub fn run(&self, terminal: Vec<f64>, guard: &PeriodGuard) -> SolverResult<BackwardPass> {
        let periods = self.tensor.periods();
        let bins = terminal.len();
        let strategies = self.tensor.strategies();

        let mut utility = vec![0.0; periods * bins];
        utility.extend(terminal);
        let mut policy = vec![PolicyCell::Ambiguous; periods * bins];
        let mut first_best = vec![0; periods * bins];
        let mut expected = vec![0.0; bins * strategies];

        for p in (0..periods).rev() {
            guard.check(p)?;

            let (head, tail) = utility.split_at_mut((p + 1) * bins);
            let current = &mut head[p * bins..];
            let next = &tail[..bins];
            let transitions = self.tensor.period(p);

            if let Err(e) = self.backend.contract(transitions, next, &mut expected) {
                log::warn!(
                    "Period {}: {} contraction failed ({}), recomputing on the CPU",
                    p,
                    self.backend.name(),
                    e
                );
                contract_cpu(transitions, next, &mut expected, self.parallel);
            }

            let policy_row = &mut policy[p * bins..(p + 1) * bins];
            let best_row = &mut first_best[p * bins..(p + 1) * bins];
            let tolerance = self.tie_tolerance;
            let apply = |(((u, cell), best), scores): (((&mut f64, &mut PolicyCell), &mut usize), &[f64])| {
                let (value, selected, first) = select(scores, tolerance);
                *u = value;
                *cell = selected;
                *best = first;
            };

            if self.parallel {
                current
                    .par_iter_mut()
                    .zip(policy_row.par_iter_mut())
                    .zip(best_row.par_iter_mut())
                    .zip(expected.par_chunks(strategies))
                    .for_each(apply);
            } else {
                current
                    .iter_mut()
                    .zip(policy_row.iter_mut())
                    .zip(best_row.iter_mut())
                    .zip(expected.chunks(strategies))
                    .for_each(apply);
            }

            log::trace!("Period {} solved", p);
        }

        Ok(BackwardPass {
            utility,
            policy,
            first_best,
        })
    }
}

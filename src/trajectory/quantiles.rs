//! Confidence bands over a trajectory

use serde::Serialize;

use super::Trajectory;
use crate::error::{SolverError, SolverResult};

/// Central band holding `probability` of the mass in each period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantileTrace {
    pub probability: f64,
    /// Periods the bounds refer to
    pub periods: Vec<usize>,
    /// Extended bin of the lower bound per period
    pub lower: Vec<usize>,
    /// Extended bin of the upper bound per period
    pub upper: Vec<usize>,
}

impl Trajectory {
    /// Bands for each confidence level, for every period from `start` on
    ///
    /// Levels are returned widest first. A bound is the first bin, sweeping
    /// in from its side, where the accumulated mass is positive and reaches
    /// the tail `(1 - p) / 2`; if it is never reached the lower bound sits at
    /// the top bin and the upper bound at bin 0.
    pub fn quantiles(&self, probabilities: &[f64], start: usize) -> SolverResult<Vec<QuantileTrace>> {
        if let Some(&value) = probabilities
            .iter()
            .find(|p| !(0.0..=1.0).contains(*p))
        {
            return Err(SolverError::InvalidProbability { value });
        }

        let mut levels = probabilities.to_vec();
        levels.sort_by(|a, b| b.total_cmp(a));
        let tails: Vec<f64> = levels.iter().map(|p| (1.0 - p) / 2.0).collect();

        let periods: Vec<usize> = (start..self.rows()).collect();
        let mut traces: Vec<QuantileTrace> = levels
            .iter()
            .map(|&probability| QuantileTrace {
                probability,
                periods: periods.clone(),
                lower: Vec::with_capacity(periods.len()),
                upper: Vec::with_capacity(periods.len()),
            })
            .collect();

        for &period in &periods {
            let row = self.row(period);
            let lower = sweep(row.iter().copied().enumerate(), &tails, self.bins - 1);
            let upper = sweep(row.iter().copied().enumerate().rev(), &tails, 0);

            for (trace, (lo, hi)) in traces.iter_mut().zip(lower.into_iter().zip(upper)) {
                trace.lower.push(lo);
                trace.upper.push(hi);
            }
        }

        Ok(traces)
    }
}

/// One pass over `(bin, mass)` pairs, resolving ascending `tails` in order
fn sweep(bins: impl Iterator<Item = (usize, f64)>, tails: &[f64], unreached: usize) -> Vec<usize> {
    let mut bounds = vec![unreached; tails.len()];
    let mut next = 0;
    let mut cumulative = 0.0;

    for (bin, mass) in bins {
        if next == tails.len() {
            break;
        }
        cumulative += mass;
        while next < tails.len() && cumulative > 0.0 && cumulative >= tails[next] {
            bounds[next] = bin;
            next += 1;
        }
    }

    bounds
}

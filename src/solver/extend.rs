//! Wealth grid extension
//!
//! The caller's grid is wrapped with a bankruptcy sink below and a coarse,
//! geometrically spaced tail above, so every reachable wealth lands in some
//! bin and the recursion has well-defined boundary conditions.

use std::ops::Range;

use crate::error::{SolverError, SolverResult};
use crate::problem::Problem;

/// Coarse ratio used when the strategies give no usable spread
pub const FALLBACK_COARSE_STEP: f64 = 0.05;

/// Minimum number of coarse bins above the original grid
const MIN_COARSE_BINS: usize = 2;

/// Extended wealth grid
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedGrid {
    /// `bins + 1` boundaries from `-f64::MAX` to `f64::MAX`
    pub boundaries: Vec<f64>,

    /// Representative value of each bin
    pub values: Vec<f64>,

    /// Extended indices of the caller's bins
    pub original: Range<usize>,
}

impl ExtendedGrid {
    /// Total number of extended bins
    pub fn bins(&self) -> usize {
        self.values.len()
    }

    /// Number of bins in the caller's grid
    pub fn original_len(&self) -> usize {
        self.original.len()
    }

    /// Bin holding `wealth`, i.e. the `j` with `b[j] <= wealth < b[j+1]`
    pub fn bin_of(&self, wealth: f64) -> usize {
        let upper = self.boundaries.partition_point(|b| *b <= wealth);
        upper.saturating_sub(1).min(self.bins() - 1)
    }
}

/// Parameters of the geometric tail
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CoarseTail {
    /// First coarse boundary (the last original one when positive)
    pub anchor: f64,
    /// Upper bound on reachable wealth
    pub max: f64,
    /// Growth ratio between consecutive coarse boundaries, minus one
    pub step: f64,
}

impl CoarseTail {
    pub fn for_problem(problem: &Problem) -> Self {
        let original_max = problem.grid.last_boundary();
        let anchor = if original_max > 0.0 {
            original_max
        } else {
            problem.grid.step.max(1.0)
        };

        let step = coarse_step(problem, anchor);
        let max = coarse_max(problem, anchor, step);
        Self { anchor, max, step }
    }

    /// Number of coarse boundaries, anchor included
    fn boundary_count(&self) -> f64 {
        let count = ((self.max / self.anchor).ln() / self.step.ln_1p() + 1e-9).floor() + 1.0;
        count.max((MIN_COARSE_BINS + 1) as f64)
    }
}

fn coarse_step(problem: &Problem, anchor: f64) -> f64 {
    let narrowest_spread = problem
        .strategies
        .iter()
        .map(|s| s.location().abs() + s.scale())
        .fold(f64::INFINITY, f64::min);

    let step = (problem.grid.step / anchor).max(narrowest_spread);
    if step.is_finite() && step > 0.0 {
        step
    } else {
        FALLBACK_COARSE_STEP
    }
}

fn coarse_max(problem: &Problem, anchor: f64, step: f64) -> f64 {
    // Worst case: the highest running total of the schedule
    let (cashflow_peak, _) = problem
        .cashflows
        .iter()
        .fold((0.0_f64, 0.0_f64), |(peak, sum), cf| {
            let sum = sum + cf;
            (peak.max(sum), sum)
        });

    let max_growth = problem
        .strategies
        .iter()
        .map(|s| s.location() + s.scale())
        .fold(0.0_f64, f64::max);

    let max = (anchor + cashflow_peak) * (1.0 + max_growth * problem.periods as f64);
    let floor = anchor * (1.0 + step).powi(MIN_COARSE_BINS as i32);
    if max.is_finite() && max >= floor {
        max
    } else {
        floor
    }
}

/// Extend the problem's grid, refusing grids above `max_bins`
pub fn extend_wealth_grid(problem: &Problem, max_bins: usize) -> SolverResult<ExtendedGrid> {
    let grid = &problem.grid;
    let tail = CoarseTail::for_problem(problem);

    let coarse_count = tail.boundary_count();
    // original bins + bankruptcy + coarse bins above the original grid + top bin
    let projected_bins = grid.len() as f64 + coarse_count;
    if projected_bins > max_bins as f64 {
        return Err(SolverError::GridTooLarge {
            bins: projected_bins.min(usize::MAX as f64) as usize,
            limit: max_bins,
        });
    }
    let coarse_count = coarse_count as usize;

    let ratio = 1.0 + tail.step;
    let coarse: Vec<f64> = (0..coarse_count)
        .map(|k| tail.anchor * ratio.powi(k as i32))
        .collect();

    let mut boundaries = Vec::with_capacity(grid.len() + coarse_count + 1);
    boundaries.push(-f64::MAX);
    boundaries.extend_from_slice(&grid.boundaries);
    boundaries.extend_from_slice(&coarse[1..]);
    boundaries.push(f64::MAX);

    let mut values = Vec::with_capacity(boundaries.len() - 1);
    values.push(grid.values[0]);
    values.extend_from_slice(&grid.values);
    // The first coarse bin is the caller's last bin and keeps its value
    values.extend(coarse[1..].windows(2).map(|w| (w[0] + w[1]) / 2.0));
    let top = values[values.len() - 1];
    values.push(top);

    debug_assert_eq!(values.len() + 1, boundaries.len());

    log::debug!(
        "Extended grid: {} original bins -> {} bins (coarse step {:.4}, coarse max {:.2})",
        grid.len(),
        values.len(),
        tail.step,
        tail.max
    );

    Ok(ExtendedGrid {
        boundaries,
        values,
        original: 1..1 + grid.len(),
    })
}

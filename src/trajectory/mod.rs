//! Forward simulation of the optimal policy
//!
//! A trajectory is the wealth distribution over time when a single cell is
//! seeded with probability one and the resolved policy is followed from
//! there. Quantile bands summarise it period by period.

mod propagate;
mod quantiles;

pub use quantiles::QuantileTrace;

use std::ops::Range;

/// Wealth distribution per period over the extended grid
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    bins: usize,
    start_period: usize,
    /// `(periods + 1) x bins`
    rows: Vec<f64>,
    /// Extended indices of the caller's bins
    window: Range<usize>,
}

impl Trajectory {
    /// Number of period rows, terminal included
    pub fn rows(&self) -> usize {
        self.rows.len() / self.bins
    }

    /// Number of decision periods
    pub fn periods(&self) -> usize {
        self.rows() - 1
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Period holding the seed
    pub fn start_period(&self) -> usize {
        self.start_period
    }

    /// Distribution at the start of `period`
    pub fn row(&self, period: usize) -> &[f64] {
        &self.rows[period * self.bins..(period + 1) * self.bins]
    }

    /// Total probability in `period`
    pub fn mass(&self, period: usize) -> f64 {
        self.row(period).iter().sum()
    }

    /// Caller's grid index of extended `bin`, if it lies inside the grid
    pub fn original_index(&self, bin: usize) -> Option<usize> {
        self.window.contains(&bin).then(|| bin - self.window.start)
    }
}

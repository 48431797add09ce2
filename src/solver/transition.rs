//! Banded transition probabilities
//!
//! For every (origin bin, strategy) pair the continuous return distribution
//! is integrated over the destination bins it can reach. Only that band of
//! destinations is stored, in a flat CSR-style buffer per distinct cashflow
//! value; periods with a bit-identical cashflow share one buffer.

use std::collections::HashMap;

use rayon::prelude::*;

use super::extend::ExtendedGrid;
use crate::problem::Strategy;

/// Destination band of one (origin bin, strategy) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band<'a> {
    /// First destination bin
    pub start: usize,
    /// Probability of landing in `start + k`
    pub probabilities: &'a [f64],
}

impl<'a> Band<'a> {
    /// One past the last destination bin
    pub fn end(&self) -> usize {
        self.start + self.probabilities.len()
    }

    /// Total probability carried by the band
    pub fn mass(&self) -> f64 {
        self.probabilities.iter().sum()
    }

    /// `Σ_k p_k · values[start + k]`
    pub fn expectation(&self, values: &[f64]) -> f64 {
        self.probabilities
            .iter()
            .zip(&values[self.start..self.end()])
            .map(|(p, v)| p * v)
            .sum()
    }
}

/// Transitions for every (bin, strategy) pair under one cashflow value
#[derive(Debug, Clone)]
pub struct CashflowTransitions {
    cashflow: f64,
    bins: usize,
    strategies: usize,
    /// Band start per `bin * strategies + strategy`
    starts: Vec<usize>,
    /// Offsets into `probabilities`, one more than `starts`
    offsets: Vec<usize>,
    probabilities: Vec<f64>,
}

impl CashflowTransitions {
    fn build(grid: &ExtendedGrid, strategies: &[Strategy], cashflow: f64, parallel: bool) -> Self {
        let bins = grid.bins();
        let row = |i: usize| -> Vec<(usize, Vec<f64>)> {
            strategies
                .iter()
                .map(|strategy| {
                    if i == 0 {
                        // Bankruptcy is absorbing
                        (0, vec![1.0])
                    } else {
                        discretize(grid, strategy, grid.values[i], cashflow)
                    }
                })
                .collect()
        };

        let rows: Vec<Vec<(usize, Vec<f64>)>> = if parallel {
            (0..bins).into_par_iter().map(row).collect()
        } else {
            (0..bins).map(row).collect()
        };

        let pairs = bins * strategies.len();
        let mut starts = Vec::with_capacity(pairs);
        let mut offsets = Vec::with_capacity(pairs + 1);
        let mut probabilities = Vec::new();
        offsets.push(0);

        for (start, band) in rows.into_iter().flatten() {
            starts.push(start);
            probabilities.extend_from_slice(&band);
            offsets.push(probabilities.len());
        }

        Self {
            cashflow,
            bins,
            strategies: strategies.len(),
            starts,
            offsets,
            probabilities,
        }
    }

    fn index(&self, bin: usize, strategy: usize) -> usize {
        assert!(
            bin < self.bins && strategy < self.strategies,
            "transition index ({}, {}) out of range ({} bins, {} strategies)",
            bin,
            strategy,
            self.bins,
            self.strategies
        );
        bin * self.strategies + strategy
    }

    /// Band reached from `bin` under `strategy`
    pub fn band(&self, bin: usize, strategy: usize) -> Band<'_> {
        let k = self.index(bin, strategy);
        Band {
            start: self.starts[k],
            probabilities: &self.probabilities[self.offsets[k]..self.offsets[k + 1]],
        }
    }

    /// Cashflow value these transitions were built for
    pub fn cashflow(&self) -> f64 {
        self.cashflow
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn strategies(&self) -> usize {
        self.strategies
    }

    /// Number of stored probabilities
    pub fn stored_entries(&self) -> usize {
        self.probabilities.len()
    }
}

/// Integrate `strategy` from a bin of value `value` into destination bins
///
/// The band is `[bottom, top)` where `bottom` is the last bin whose lower
/// boundary lies strictly below the lowest reachable wealth and `top - 1` is
/// the bin holding the highest. Edge CDF arguments are clamped to the
/// support so the band carries exactly `CDF(high) - CDF(low)`.
pub(crate) fn discretize(
    grid: &ExtendedGrid,
    strategy: &Strategy,
    value: f64,
    cashflow: f64,
) -> (usize, Vec<f64>) {
    let bins = grid.bins();
    let support = strategy.support;

    // Cashflow is added after the multiplicative return
    let lowest = (support.low + 1.0) * value + cashflow;
    let highest = (support.high + 1.0) * value + cashflow;

    let bottom = grid
        .boundaries
        .partition_point(|b| *b < lowest)
        .saturating_sub(1)
        .min(bins - 1);
    let top = grid
        .boundaries
        .partition_point(|b| *b <= highest)
        .clamp(bottom + 1, bins);

    let cdf_at = |boundary: f64| {
        let r = ((boundary - cashflow) / value - 1.0).clamp(support.low, support.high);
        strategy.cdf(r)
    };

    let mut band = Vec::with_capacity(top - bottom);
    let mut lower = cdf_at(grid.boundaries[bottom]);
    for j in bottom..top {
        let upper = cdf_at(grid.boundaries[j + 1]);
        // NaN collapses to zero here
        band.push((upper - lower).max(0.0));
        lower = upper;
    }

    match band.iter().position(|p| *p > 0.0) {
        Some(first) => {
            let last = band.iter().rposition(|p| *p > 0.0).unwrap_or(first);
            (bottom + first, band[first..=last].to_vec())
        }
        None => {
            // No mass inside the support: send everything to the location
            let target = grid.bin_of((strategy.location() + 1.0) * value + cashflow);
            (target, vec![1.0])
        }
    }
}

/// Key for bit-exact cashflow dedup, folding -0.0 into 0.0
fn cashflow_key(cashflow: f64) -> u64 {
    if cashflow == 0.0 {
        0.0_f64.to_bits()
    } else {
        cashflow.to_bits()
    }
}

/// Per-period transitions, shared between periods with the same cashflow
#[derive(Debug, Clone)]
pub struct TransitionTensor {
    slots: Vec<CashflowTransitions>,
    period_slots: Vec<usize>,
}

impl TransitionTensor {
    /// Build transitions for every period of `cashflows`
    pub fn build(
        grid: &ExtendedGrid,
        strategies: &[Strategy],
        cashflows: &[f64],
        parallel: bool,
    ) -> Self {
        let mut lookup: HashMap<u64, usize> = HashMap::new();
        let mut distinct = Vec::new();
        let period_slots = cashflows
            .iter()
            .map(|&cashflow| {
                *lookup.entry(cashflow_key(cashflow)).or_insert_with(|| {
                    distinct.push(cashflow);
                    distinct.len() - 1
                })
            })
            .collect();

        let slots: Vec<CashflowTransitions> = distinct
            .iter()
            .map(|&cashflow| CashflowTransitions::build(grid, strategies, cashflow, parallel))
            .collect();

        log::debug!(
            "Transition tensor: {} periods over {} distinct cashflows, {} stored probabilities",
            cashflows.len(),
            slots.len(),
            slots.iter().map(|s| s.stored_entries()).sum::<usize>()
        );

        Self {
            slots,
            period_slots,
        }
    }

    pub fn periods(&self) -> usize {
        self.period_slots.len()
    }

    pub fn bins(&self) -> usize {
        self.slots.first().map_or(0, |s| s.bins())
    }

    pub fn strategies(&self) -> usize {
        self.slots.first().map_or(0, |s| s.strategies())
    }

    /// Number of distinct cashflow slots
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Slot index used by `period`
    pub fn slot_of(&self, period: usize) -> usize {
        self.period_slots[period]
    }

    /// Transitions applying in `period`
    pub fn period(&self, period: usize) -> &CashflowTransitions {
        &self.slots[self.period_slots[period]]
    }

    /// Band for `(period, bin, strategy)`
    pub fn band(&self, period: usize, bin: usize, strategy: usize) -> Band<'_> {
        self.period(period).band(bin, strategy)
    }
}

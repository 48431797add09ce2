//! Wealth grid definition

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};

/// The caller's wealth grid
///
/// Boundary `k` opens the bin represented by `values[k]`; the last original
/// bin runs from the last boundary up to the first coarse boundary added by
/// the grid extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WealthGrid {
    /// Strictly increasing lower bin boundaries, conventionally starting at 0
    pub boundaries: Vec<f64>,

    /// Representative wealth of each bin (one per boundary)
    pub values: Vec<f64>,

    /// Width of the fine bins in currency units
    pub step: f64,
}

impl WealthGrid {
    /// Build a grid from explicit boundaries and values
    pub fn new(boundaries: Vec<f64>, values: Vec<f64>, step: f64) -> Self {
        Self {
            boundaries,
            values,
            step,
        }
    }

    /// Evenly spaced grid `min, min + step, ..., max` with midpoint values
    pub fn uniform(min: f64, max: f64, step: f64) -> SolverResult<Self> {
        if !(step > 0.0) || !min.is_finite() || !max.is_finite() || max < min {
            return Err(SolverError::invalid(format!(
                "uniform grid needs finite min <= max and a positive step (min={}, max={}, step={})",
                min, max, step
            )));
        }

        // Inclusive of max, tolerant to accumulated rounding
        let count = ((max - min) / step + 1e-9).floor() as usize + 1;
        let boundaries: Vec<f64> = (0..count).map(|k| min + k as f64 * step).collect();
        let values = boundaries.iter().map(|b| b + step / 2.0).collect();

        Ok(Self {
            boundaries,
            values,
            step,
        })
    }

    /// Number of original bins
    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// Largest original boundary
    pub fn last_boundary(&self) -> f64 {
        self.boundaries.last().copied().unwrap_or(0.0)
    }

    pub(crate) fn validate(&self) -> SolverResult<()> {
        if self.boundaries.is_empty() {
            return Err(SolverError::invalid("wealth grid has no boundaries"));
        }
        if self.values.len() != self.boundaries.len() {
            return Err(SolverError::invalid(format!(
                "wealth grid has {} boundaries but {} values",
                self.boundaries.len(),
                self.values.len()
            )));
        }
        if self.boundaries.iter().any(|b| !b.is_finite()) {
            return Err(SolverError::invalid("wealth boundaries must be finite"));
        }
        if self.boundaries.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SolverError::invalid("wealth boundaries must be strictly increasing"));
        }
        // Returns are mapped back through value division
        if self.values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(SolverError::invalid("wealth values must be finite and positive"));
        }
        if !self.step.is_finite() || self.step < 0.0 {
            return Err(SolverError::invalid("wealth step must be finite and non-negative"));
        }
        Ok(())
    }
}

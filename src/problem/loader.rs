//! Problem files
//!
//! A problem is described by a JSON document; the cashflow schedule may be
//! inlined or kept in a separate `period,amount` CSV next to it.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Problem, Strategy, UtilityFunction, WealthGrid};
use crate::error::{SolverError, SolverResult};

/// Wealth grid as written in a problem file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridSpec {
    /// Evenly spaced boundaries with midpoint values
    Uniform { min: f64, max: f64, step: f64 },

    /// Explicit boundaries; values default to `boundary + step / 2`
    Explicit {
        boundaries: Vec<f64>,
        #[serde(default)]
        values: Option<Vec<f64>>,
        step: f64,
    },
}

impl GridSpec {
    fn build(&self) -> SolverResult<WealthGrid> {
        match self {
            GridSpec::Uniform { min, max, step } => WealthGrid::uniform(*min, *max, *step),
            GridSpec::Explicit {
                boundaries,
                values,
                step,
            } => {
                let values = values
                    .clone()
                    .unwrap_or_else(|| boundaries.iter().map(|b| b + step / 2.0).collect());
                Ok(WealthGrid::new(boundaries.clone(), values, *step))
            }
        }
    }
}

/// Strategy entry of a problem file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySpec {
    pub name: String,
    pub location: f64,
    pub scale: f64,
    /// Optional `[low, high]` override of the default support
    #[serde(default)]
    pub support: Option<[f64; 2]>,
}

impl StrategySpec {
    fn build(&self) -> Strategy {
        let strategy = Strategy::gaussian(self.name.clone(), self.location, self.scale);
        match self.support {
            Some([low, high]) => strategy.with_support(low, high),
            None => strategy,
        }
    }
}

/// Top-level JSON problem document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemFile {
    pub grid: GridSpec,
    pub periods: usize,
    pub strategies: Vec<StrategySpec>,

    /// Inline schedule, one amount per period
    #[serde(default)]
    pub cashflows: Option<Vec<f64>>,

    /// CSV schedule, resolved relative to the problem file
    #[serde(default)]
    pub cashflows_csv: Option<PathBuf>,

    #[serde(default)]
    pub utility: UtilityFunction,
}

impl ProblemFile {
    /// Parse a problem document from any reader
    pub fn from_reader<R: Read>(reader: R) -> SolverResult<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Build the problem; `base_dir` anchors a relative cashflow CSV path
    pub fn into_problem(self, base_dir: &Path) -> SolverResult<Problem> {
        let grid = self.grid.build()?;
        let strategies = self.strategies.iter().map(StrategySpec::build).collect();

        let cashflows = match (self.cashflows, self.cashflows_csv) {
            (Some(_), Some(_)) => {
                return Err(SolverError::invalid(
                    "specify either inline cashflows or cashflows_csv, not both",
                ))
            }
            (Some(inline), None) => inline,
            (None, Some(csv_path)) => {
                load_cashflows_csv(&base_dir.join(csv_path), self.periods)?
            }
            (None, None) => vec![0.0; self.periods],
        };

        let problem = Problem::new(grid, self.periods, strategies, cashflows, self.utility);
        problem.validate()?;
        Ok(problem)
    }
}

/// Load and validate a problem from a JSON file
pub fn load_problem(path: &Path) -> SolverResult<Problem> {
    let file = File::open(path)?;
    let document = ProblemFile::from_reader(file)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let problem = document.into_problem(base_dir)?;

    log::info!(
        "Loaded problem from {}: {} bins, {} periods, {} strategies",
        path.display(),
        problem.grid.len(),
        problem.periods,
        problem.strategies.len()
    );
    Ok(problem)
}

/// Raw CSV row of a cashflow schedule
#[derive(Debug, Deserialize)]
struct CashflowRow {
    /// 1-indexed period
    period: usize,
    amount: f64,
}

/// Load a `period,amount` schedule; periods absent from the file get zero
pub fn load_cashflows_csv(path: &Path, periods: usize) -> SolverResult<Vec<f64>> {
    let file = File::open(path)?;
    load_cashflows_from_reader(file, periods)
}

pub fn load_cashflows_from_reader<R: Read>(reader: R, periods: usize) -> SolverResult<Vec<f64>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut cashflows = vec![0.0; periods];

    for result in reader.deserialize() {
        let row: CashflowRow = result?;
        if row.period == 0 || row.period > periods {
            return Err(SolverError::invalid(format!(
                "cashflow period {} outside 1..={}",
                row.period, periods
            )));
        }
        cashflows[row.period - 1] += row.amount;
    }

    Ok(cashflows)
}

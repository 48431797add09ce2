//! Terminal utility functions

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Utility of terminal wealth
///
/// The solver overrides the bankruptcy bin to zero utility whatever this
/// returns there.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UtilityFunction {
    /// `u(w) = w`
    Linear,

    /// `u(w) = ln(w)`
    #[default]
    Log,

    /// Constant relative risk aversion, `ln(w)` at `gamma == 1`
    Crra { gamma: f64 },

    /// `u(w) = ln(w) + bonus` once wealth reaches `target`
    LogWithTarget { target: f64, bonus: f64 },

    /// Caller-supplied function, not serializable
    #[serde(skip)]
    Custom(CustomUtility),
}

impl UtilityFunction {
    /// Wrap an arbitrary function
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        UtilityFunction::Custom(CustomUtility(Arc::new(f)))
    }

    /// Evaluate the utility of wealth `w`
    pub fn evaluate(&self, w: f64) -> f64 {
        match self {
            UtilityFunction::Linear => w,
            UtilityFunction::Log => w.ln(),
            UtilityFunction::Crra { gamma } => {
                if (gamma - 1.0).abs() < 1e-12 {
                    w.ln()
                } else {
                    w.powf(1.0 - gamma) / (1.0 - gamma)
                }
            }
            UtilityFunction::LogWithTarget { target, bonus } => {
                let step = if w >= *target { *bonus } else { 0.0 };
                w.ln() + step
            }
            UtilityFunction::Custom(f) => (f.0)(w),
        }
    }
}

impl fmt::Debug for UtilityFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UtilityFunction::Linear => write!(f, "Linear"),
            UtilityFunction::Log => write!(f, "Log"),
            UtilityFunction::Crra { gamma } => write!(f, "Crra {{ gamma: {} }}", gamma),
            UtilityFunction::LogWithTarget { target, bonus } => {
                write!(f, "LogWithTarget {{ target: {}, bonus: {} }}", target, bonus)
            }
            UtilityFunction::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}


/// Shared handle to a caller-supplied utility
#[derive(Clone)]
pub struct CustomUtility(Arc<dyn Fn(f64) -> f64 + Send + Sync>);

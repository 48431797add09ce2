//! Investment strategies and their return distributions

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Support half-width in standard deviations for Gaussian strategies
pub const SUPPORT_SIGMAS: f64 = 6.0;

/// Support half-width for zero-scale (point mass) strategies
pub const DEGENERATE_HALF_WIDTH: f64 = 1e-9;

/// Distribution of the one-period return `r`, wealth moving to `(1 + r) * w`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReturnDistribution {
    /// Normal returns; `scale == 0` is the point mass at `location`
    Gaussian { location: f64, scale: f64 },
}

impl ReturnDistribution {
    /// Cumulative probability `P(R <= r)`
    pub fn cdf(&self, r: f64) -> f64 {
        match *self {
            ReturnDistribution::Gaussian { location, scale } => {
                if scale > 0.0 {
                    match Normal::new(location, scale) {
                        Ok(normal) => normal.cdf(r),
                        Err(_) => point_mass_cdf(location, r),
                    }
                } else {
                    point_mass_cdf(location, r)
                }
            }
        }
    }

    /// Location parameter (the mean for the Gaussian family)
    pub fn location(&self) -> f64 {
        match *self {
            ReturnDistribution::Gaussian { location, .. } => location,
        }
    }

    /// Spread parameter (the standard deviation for the Gaussian family)
    pub fn scale(&self) -> f64 {
        match *self {
            ReturnDistribution::Gaussian { scale, .. } => scale,
        }
    }

    /// Bounded return interval carrying effectively all of the mass
    pub fn default_support(&self) -> Support {
        match *self {
            ReturnDistribution::Gaussian { location, scale } => {
                let half_width = if scale > 0.0 {
                    SUPPORT_SIGMAS * scale
                } else {
                    DEGENERATE_HALF_WIDTH
                };
                Support::new(location - half_width, location + half_width)
            }
        }
    }
}

/// Left-continuous, so a bin `[b, b')` holds the mass when `b` hits the location
fn point_mass_cdf(location: f64, r: f64) -> f64 {
    if r > location {
        1.0
    } else {
        0.0
    }
}

/// Finite return interval `[low, high]` bounding the band search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Support {
    pub low: f64,
    pub high: f64,
}

impl Support {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }
}

/// A named investment strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub name: String,
    pub distribution: ReturnDistribution,
    pub support: Support,
}

impl Strategy {
    /// Gaussian strategy with the default `location ± 6 scale` support
    pub fn gaussian(name: impl Into<String>, location: f64, scale: f64) -> Self {
        let distribution = ReturnDistribution::Gaussian { location, scale };
        Self {
            name: name.into(),
            support: distribution.default_support(),
            distribution,
        }
    }

    /// Override the support interval
    pub fn with_support(mut self, low: f64, high: f64) -> Self {
        self.support = Support::new(low, high);
        self
    }

    pub fn cdf(&self, r: f64) -> f64 {
        self.distribution.cdf(r)
    }

    /// Probability mass inside the support
    pub fn support_mass(&self) -> f64 {
        self.cdf(self.support.high) - self.cdf(self.support.low)
    }

    pub fn location(&self) -> f64 {
        self.distribution.location()
    }

    pub fn scale(&self) -> f64 {
        self.distribution.scale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_gaussian_cdf_is_centered() {
        let s = Strategy::gaussian("e_50", 0.03, 0.1);
        assert_abs_diff_eq!(s.cdf(0.03), 0.5, epsilon = 1e-12);
        assert!(s.cdf(-1.0) < 1e-20);
        assert!(s.cdf(1.0) > 1.0 - 1e-12);
    }

    #[test]
    fn test_point_mass_cdf_steps_at_location() {
        let cash = Strategy::gaussian("cash", 0.01, 0.0);
        assert_eq!(cash.cdf(0.0099), 0.0);
        assert_eq!(cash.cdf(0.01), 0.0);
        assert_eq!(cash.cdf(0.0101), 1.0);
        assert_eq!(cash.support_mass(), 1.0);
    }

    #[test]
    fn test_default_support_covers_mass() {
        for (mu, sigma) in [(0.02, 0.05), (0.05, 0.2), (-0.01, 0.3)] {
            let s = Strategy::gaussian("s", mu, sigma);
            assert_abs_diff_eq!(s.support_mass(), 1.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_distribution_round_trips_through_json() {
        let s = Strategy::gaussian("e_25", 0.02, 0.05);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"type\":\"gaussian\""));
        let back: Strategy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}

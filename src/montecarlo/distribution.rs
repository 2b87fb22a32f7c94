//! Marginal distributions for stochastic inputs.
//!
//! Each distribution can be sampled two ways: natively (independent variables) or by
//! mapping a standard-normal draw through its inverse CDF (members of a
//! correlation group, so the Gaussian dependence carries over).

use super::error::MonteCarloError;
use rand::Rng;
use rand_distr::{Distribution, Normal, Triangular, Uniform};
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;

/// Uniform draws are kept strictly inside (0, 1) before inversion.
const UNIFORM_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Marginal {
    Normal { mean: f64, std: f64 },
    Uniform { low: f64, high: f64 },
    Triangular { left: f64, mode: f64, right: f64 },
}

/// A marginal plus an optional post-sample clip to `[min_bound, max_bound]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionSpec {
    #[serde(flatten)]
    pub marginal: Marginal,
    #[serde(default)]
    pub min_bound: Option<f64>,
    #[serde(default)]
    pub max_bound: Option<f64>,
}

impl DistributionSpec {
    pub fn normal(mean: f64, std: f64) -> Self {
        Self::from_marginal(Marginal::Normal { mean, std })
    }

    pub fn uniform(low: f64, high: f64) -> Self {
        Self::from_marginal(Marginal::Uniform { low, high })
    }

    pub fn triangular(left: f64, mode: f64, right: f64) -> Self {
        Self::from_marginal(Marginal::Triangular { left, mode, right })
    }

    fn from_marginal(marginal: Marginal) -> Self {
        Self { marginal, min_bound: None, max_bound: None }
    }

    pub fn with_bounds(mut self, min_bound: Option<f64>, max_bound: Option<f64>) -> Self {
        self.min_bound = min_bound;
        self.max_bound = max_bound;
        self
    }

    /// Checks the parameters; `variable` only labels the error.
    pub fn validate(&self, variable: &str) -> Result<(), MonteCarloError> {
        let finite = |vals: &[f64]| vals.iter().all(|v| v.is_finite());
        match self.marginal {
            Marginal::Normal { mean, std } => {
                if !finite(&[mean, std]) {
                    return Err(MonteCarloError::distribution(variable, "normal parameters must be finite"));
                }
                if std <= 0.0 {
                    return Err(MonteCarloError::distribution(variable, format!("std must be > 0, got {}", std)));
                }
            }
            Marginal::Uniform { low, high } => {
                if !finite(&[low, high]) {
                    return Err(MonteCarloError::distribution(variable, "uniform bounds must be finite"));
                }
                if low >= high {
                    return Err(MonteCarloError::distribution(
                        variable,
                        format!("uniform requires low < high, got [{}, {}]", low, high),
                    ));
                }
            }
            Marginal::Triangular { left, mode, right } => {
                if !finite(&[left, mode, right]) {
                    return Err(MonteCarloError::distribution(variable, "triangular parameters must be finite"));
                }
                if !(left <= mode && mode <= right && left < right) {
                    return Err(MonteCarloError::distribution(
                        variable,
                        format!("triangular requires left <= mode <= right and left < right, got ({}, {}, {})", left, mode, right),
                    ));
                }
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_bound, self.max_bound) {
            if lo > hi {
                return Err(MonteCarloError::distribution(
                    variable,
                    format!("min_bound {} exceeds max_bound {}", lo, hi),
                ));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn clip(&self, x: f64) -> f64 {
        let x = match self.min_bound {
            Some(lo) if x < lo => lo,
            _ => x,
        };
        match self.max_bound {
            Some(hi) if x > hi => hi,
            _ => x,
        }
    }

    /// Draws `n` independent values with the marginal's own sampler.
    pub fn sample<R: Rng + ?Sized>(&self, variable: &str, rng: &mut R, n: usize) -> Result<Vec<f64>, MonteCarloError> {
        self.validate(variable)?;
        let draws: Vec<f64> = match self.marginal {
            Marginal::Normal { mean, std } => {
                let dist = Normal::new(mean, std).map_err(|e| MonteCarloError::distribution(variable, e.to_string()))?;
                (0..n).map(|_| dist.sample(&mut *rng)).collect()
            }
            Marginal::Uniform { low, high } => {
                let dist = Uniform::new(low, high);
                (0..n).map(|_| dist.sample(&mut *rng)).collect()
            }
            Marginal::Triangular { left, mode, right } => {
                let dist = Triangular::new(left, right, mode)
                    .map_err(|e| MonteCarloError::distribution(variable, e.to_string()))?;
                (0..n).map(|_| dist.sample(&mut *rng)).collect()
            }
        };
        Ok(draws.into_iter().map(|x| self.clip(x)).collect())
    }

    /// Maps a standard-normal draw `z` onto this marginal, then clips.
    pub fn from_standard_normal(&self, z: f64) -> f64 {
        let x = match self.marginal {
            Marginal::Normal { mean, std } => mean + std * z,
            Marginal::Uniform { low, high } => low + (high - low) * to_uniform(z),
            Marginal::Triangular { left, mode, right } => triangular_inverse_cdf(to_uniform(z), left, mode, right),
        };
        self.clip(x)
    }
}

/// Standard normal CDF.
#[inline]
pub fn norm_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / SQRT_2)
}

#[inline]
fn to_uniform(z: f64) -> f64 {
    norm_cdf(z).clamp(UNIFORM_EPS, 1.0 - UNIFORM_EPS)
}

fn triangular_inverse_cdf(u: f64, left: f64, mode: f64, right: f64) -> f64 {
    let width = right - left;
    let split = (mode - left) / width;
    if u < split {
        left + (u * width * (mode - left)).sqrt()
    } else {
        right - ((1.0 - u) * width * (right - mode)).sqrt()
    }
}

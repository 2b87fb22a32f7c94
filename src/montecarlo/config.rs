//! Monte Carlo simulation configuration.
//!
//! [`MonteCarloConfig`] is immutable and always valid: it can only be obtained
//! through [`MonteCarloConfigBuilder::build`] (or the serde-facing
//! [`MonteCarloSettings`], which goes through the same builder).

use super::error::MonteCarloError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What to do when a correlation matrix is not positive semi-definite.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PsdRepairPolicy {
    /// Fail with `NotPositiveSemiDefinite`.
    Error,
    /// Floor eigenvalues, rescale to unit diagonal, re-project once.
    #[default]
    Clip,
    /// Higham's alternating projections with Dykstra's correction.
    Higham,
}

impl fmt::Display for PsdRepairPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PsdRepairPolicy::Error => "error",
            PsdRepairPolicy::Clip => "clip",
            PsdRepairPolicy::Higham => "higham",
        };
        f.write_str(s)
    }
}

impl FromStr for PsdRepairPolicy {
    type Err = MonteCarloError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(PsdRepairPolicy::Error),
            "clip" => Ok(PsdRepairPolicy::Clip),
            "higham" => Ok(PsdRepairPolicy::Higham),
            other => Err(MonteCarloError::InvalidConfig {
                field: "psd_repair_policy",
                reason: format!("unknown policy '{}'", other),
            }),
        }
    }
}

/// Immutable Monte Carlo configuration.
///
/// # Examples
///
/// ```rust
/// use prism_valuation_core::MonteCarloConfig;
///
/// let config = MonteCarloConfig::builder()
///     .iterations(5_000)
///     .seed(42)
///     .build()
///     .expect("valid configuration");
///
/// assert_eq!(config.iterations(), 5_000);
/// assert_eq!(config.seed(), Some(42));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct MonteCarloConfig {
    iterations: usize,
    min_iterations: usize,
    batch_size: usize,
    convergence_window: usize,
    dynamic_window_min: usize,
    convergence_tolerance: f64,
    psd_repair_policy: PsdRepairPolicy,
    psd_eigen_floor: f64,
    psd_tolerance: f64,
    higham_max_iterations: usize,
    higham_tolerance: f64,
    seed: Option<u64>,
    parallel: bool,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            min_iterations: 1_000,
            batch_size: 500,
            convergence_window: 500,
            dynamic_window_min: 50,
            convergence_tolerance: 1e-3,
            psd_repair_policy: PsdRepairPolicy::Clip,
            psd_eigen_floor: 1e-8,
            psd_tolerance: -1e-10,
            higham_max_iterations: 100,
            higham_tolerance: 1e-8,
            seed: None,
            parallel: true,
        }
    }
}

impl MonteCarloConfig {
    #[inline]
    pub fn builder() -> MonteCarloConfigBuilder {
        MonteCarloConfigBuilder::default()
    }

    /// Parses [`MonteCarloSettings`] from JSON and validates them.
    pub fn from_json(json: &str) -> Result<Self, MonteCarloError> {
        let settings: MonteCarloSettings = serde_json::from_str(json).map_err(|e| MonteCarloError::InvalidConfig {
            field: "settings",
            reason: e.to_string(),
        })?;
        settings.into_config()
    }

    /// Maximum number of scenarios to evaluate.
    #[inline]
    pub fn iterations(&self) -> usize { self.iterations }
    /// Scenarios that always run before early stopping is considered.
    #[inline]
    pub fn min_iterations(&self) -> usize { self.min_iterations }
    #[inline]
    pub fn batch_size(&self) -> usize { self.batch_size }
    /// Upper bound on the convergence window length.
    #[inline]
    pub fn convergence_window(&self) -> usize { self.convergence_window }
    /// Lower bound on the convergence window length.
    #[inline]
    pub fn dynamic_window_min(&self) -> usize { self.dynamic_window_min }
    /// Maximum relative change of the windowed median to count as converged.
    #[inline]
    pub fn convergence_tolerance(&self) -> f64 { self.convergence_tolerance }
    #[inline]
    pub fn psd_repair_policy(&self) -> PsdRepairPolicy { self.psd_repair_policy }
    /// Eigenvalue floor used when projecting onto the PSD cone.
    #[inline]
    pub fn psd_eigen_floor(&self) -> f64 { self.psd_eigen_floor }
    /// Smallest eigenvalue accepted without repair.
    #[inline]
    pub fn psd_tolerance(&self) -> f64 { self.psd_tolerance }
    #[inline]
    pub fn higham_max_iterations(&self) -> usize { self.higham_max_iterations }
    #[inline]
    pub fn higham_tolerance(&self) -> f64 { self.higham_tolerance }
    #[inline]
    pub fn seed(&self) -> Option<u64> { self.seed }
    /// Whether batches are evaluated on the rayon pool.
    #[inline]
    pub fn parallel(&self) -> bool { self.parallel }

    fn validate(&self) -> Result<(), MonteCarloError> {
        fn positive(field: &'static str, value: usize) -> Result<(), MonteCarloError> {
            if value == 0 {
                return Err(MonteCarloError::InvalidConfig { field, reason: "must be > 0".into() });
            }
            Ok(())
        }
        fn above_one(field: &'static str, value: usize) -> Result<(), MonteCarloError> {
            if value <= 1 {
                return Err(MonteCarloError::InvalidConfig { field, reason: format!("must be > 1, got {}", value) });
            }
            Ok(())
        }
        fn positive_f(field: &'static str, value: f64) -> Result<(), MonteCarloError> {
            if !(value.is_finite() && value > 0.0) {
                return Err(MonteCarloError::InvalidConfig { field, reason: format!("must be > 0, got {}", value) });
            }
            Ok(())
        }

        positive("iterations", self.iterations)?;
        positive("min_iterations", self.min_iterations)?;
        positive("batch_size", self.batch_size)?;
        above_one("convergence_window", self.convergence_window)?;
        above_one("dynamic_window_min", self.dynamic_window_min)?;
        positive_f("convergence_tolerance", self.convergence_tolerance)?;
        positive_f("psd_eigen_floor", self.psd_eigen_floor)?;
        positive("higham_max_iterations", self.higham_max_iterations)?;
        positive_f("higham_tolerance", self.higham_tolerance)?;
        if !self.psd_tolerance.is_finite() {
            return Err(MonteCarloError::InvalidConfig { field: "psd_tolerance", reason: "must be finite".into() });
        }
        Ok(())
    }
}

/// Builder for [`MonteCarloConfig`]; unset fields keep their defaults.
#[derive(Clone, Debug, Default)]
pub struct MonteCarloConfigBuilder {
    config: MonteCarloConfig,
}

impl MonteCarloConfigBuilder {
    pub fn iterations(mut self, n: usize) -> Self {
        self.config.iterations = n;
        self
    }

    pub fn min_iterations(mut self, n: usize) -> Self {
        self.config.min_iterations = n;
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n;
        self
    }

    pub fn convergence_window(mut self, n: usize) -> Self {
        self.config.convergence_window = n;
        self
    }

    pub fn dynamic_window_min(mut self, n: usize) -> Self {
        self.config.dynamic_window_min = n;
        self
    }

    pub fn convergence_tolerance(mut self, tol: f64) -> Self {
        self.config.convergence_tolerance = tol;
        self
    }

    pub fn psd_repair_policy(mut self, policy: PsdRepairPolicy) -> Self {
        self.config.psd_repair_policy = policy;
        self
    }

    pub fn psd_eigen_floor(mut self, floor: f64) -> Self {
        self.config.psd_eigen_floor = floor;
        self
    }

    pub fn psd_tolerance(mut self, tol: f64) -> Self {
        self.config.psd_tolerance = tol;
        self
    }

    pub fn higham_max_iterations(mut self, n: usize) -> Self {
        self.config.higham_max_iterations = n;
        self
    }

    pub fn higham_tolerance(mut self, tol: f64) -> Self {
        self.config.higham_tolerance = tol;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` naming the first offending field.
    pub fn build(self) -> Result<MonteCarloConfig, MonteCarloError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Serde-facing mirror of [`MonteCarloConfig`]; every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonteCarloSettings {
    pub iterations: Option<usize>,
    pub min_iterations: Option<usize>,
    pub batch_size: Option<usize>,
    pub convergence_window: Option<usize>,
    pub dynamic_window_min: Option<usize>,
    pub convergence_tolerance: Option<f64>,
    pub psd_repair_policy: Option<PsdRepairPolicy>,
    pub psd_eigen_floor: Option<f64>,
    pub psd_tolerance: Option<f64>,
    pub higham_max_iterations: Option<usize>,
    pub higham_tolerance: Option<f64>,
    pub seed: Option<u64>,
    pub parallel: Option<bool>,
}

impl MonteCarloSettings {
    pub fn into_config(self) -> Result<MonteCarloConfig, MonteCarloError> {
        let mut b = MonteCarloConfig::builder();
        if let Some(v) = self.iterations { b = b.iterations(v); }
        if let Some(v) = self.min_iterations { b = b.min_iterations(v); }
        if let Some(v) = self.batch_size { b = b.batch_size(v); }
        if let Some(v) = self.convergence_window { b = b.convergence_window(v); }
        if let Some(v) = self.dynamic_window_min { b = b.dynamic_window_min(v); }
        if let Some(v) = self.convergence_tolerance { b = b.convergence_tolerance(v); }
        if let Some(v) = self.psd_repair_policy { b = b.psd_repair_policy(v); }
        if let Some(v) = self.psd_eigen_floor { b = b.psd_eigen_floor(v); }
        if let Some(v) = self.psd_tolerance { b = b.psd_tolerance(v); }
        if let Some(v) = self.higham_max_iterations { b = b.higham_max_iterations(v); }
        if let Some(v) = self.higham_tolerance { b = b.higham_tolerance(v); }
        if let Some(v) = self.seed { b = b.seed(v); }
        if let Some(v) = self.parallel { b = b.parallel(v); }
        b.build()
    }
}

//! Scenario matrix generation.
//!
//! Correlated groups are drawn as `Z = A · ε` with `ε` i.i.d. standard normal
//! and `A Aᵀ` the (possibly repaired) correlation matrix; each row of `Z` is
//! then pushed through its variable's marginal. Independent variables use the
//! marginal's native sampler. Variables are visited in sorted order so a seeded
//! RNG always yields the same matrix.

use super::config::{MonteCarloConfig, PsdRepairPolicy};
use super::correlation::{prepare_matrix, sampling_factor, CorrelationGroup};
use super::distribution::DistributionSpec;
use super::error::MonteCarloError;
use nalgebra::DMatrix;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Aggregated PSD handling across all groups of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PsdRepairReport {
    pub repaired: bool,
    /// `Clip` or `Higham` if any group was repaired; `Higham` wins if both were.
    pub method: Option<PsdRepairPolicy>,
    pub clip_used: bool,
    pub higham_used: bool,
    /// Worst (lowest) value across groups.
    pub min_eigenvalue_before: Option<f64>,
    pub min_eigenvalue_after: Option<f64>,
    pub higham_iterations: usize,
}

impl PsdRepairReport {
    fn record(&mut self, before: f64, after: f64, method: Option<PsdRepairPolicy>, higham_iterations: usize) {
        self.min_eigenvalue_before = Some(self.min_eigenvalue_before.map_or(before, |m| m.min(before)));
        self.min_eigenvalue_after = Some(self.min_eigenvalue_after.map_or(after, |m| m.min(after)));
        match method {
            Some(PsdRepairPolicy::Clip) => self.clip_used = true,
            Some(PsdRepairPolicy::Higham) => self.higham_used = true,
            _ => {}
        }
        self.repaired |= method.is_some();
        self.higham_iterations += higham_iterations;
        self.method = if self.higham_used {
            Some(PsdRepairPolicy::Higham)
        } else if self.clip_used {
            Some(PsdRepairPolicy::Clip)
        } else {
            None
        };
    }
}

/// One column of draws per stochastic variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSamples {
    pub(crate) columns: BTreeMap<String, Vec<f64>>,
    pub(crate) iterations: usize,
    pub(crate) psd: PsdRepairReport,
}

impl ScenarioSamples {
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn column(&self, variable: &str) -> Option<&[f64]> {
        self.columns.get(variable).map(Vec::as_slice)
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn psd_report(&self) -> &PsdRepairReport {
        &self.psd
    }

    /// `base` overlaid with scenario `idx`.
    pub fn scenario(&self, base: &BTreeMap<String, f64>, idx: usize) -> BTreeMap<String, f64> {
        let mut inputs = base.clone();
        self.fill_scenario(&mut inputs, idx);
        inputs
    }

    pub(crate) fn fill_scenario(&self, inputs: &mut BTreeMap<String, f64>, idx: usize) {
        for (name, column) in &self.columns {
            inputs.insert(name.clone(), column[idx]);
        }
    }
}

/// Draws `iterations` scenarios for every variable in `distributions`.
pub fn draw<R: Rng + ?Sized>(
    rng: &mut R,
    distributions: &BTreeMap<String, DistributionSpec>,
    groups: &[CorrelationGroup],
    config: &MonteCarloConfig,
    iterations: usize,
) -> Result<ScenarioSamples, MonteCarloError> {
    for (name, spec) in distributions {
        spec.validate(name)?;
    }

    // Structure and membership are checked for every group before any matrix work.
    let mut grouped: BTreeSet<&str> = BTreeSet::new();
    for group in groups {
        group.validate_shape()?;
        for var in &group.variables {
            if !distributions.contains_key(var) {
                return Err(MonteCarloError::group(format!("variable '{}' has no distribution", var)));
            }
            if !grouped.insert(var.as_str()) {
                return Err(MonteCarloError::group(format!("variable '{}' appears in more than one group", var)));
            }
        }
    }

    let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut psd = PsdRepairReport::default();

    for group in groups {
        let prepared = prepare_matrix(group, config)?;
        psd.record(
            prepared.min_eigenvalue_before,
            prepared.min_eigenvalue_after,
            prepared.method,
            prepared.higham_iterations,
        );

        let n = group.len();
        let factor = sampling_factor(&prepared.matrix);
        let eps = DMatrix::<f64>::from_fn(n, iterations, |_, _| rng.sample(StandardNormal));
        let z = factor * eps;

        for (row, var) in group.variables.iter().enumerate() {
            let spec = &distributions[var];
            let column: Vec<f64> = z.row(row).iter().map(|&zi| spec.from_standard_normal(zi)).collect();
            columns.insert(var.clone(), column);
        }
    }

    for (name, spec) in distributions {
        if grouped.contains(name.as_str()) {
            continue;
        }
        columns.insert(name.clone(), spec.sample(name, rng, iterations)?);
    }

    Ok(ScenarioSamples { columns, iterations, psd })
}

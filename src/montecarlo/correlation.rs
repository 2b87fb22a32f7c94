//! Correlation groups, PSD checks and repair.
//!
//! A group's matrix is checked for shape first, then for positive
//! semi-definiteness. Anything with a minimum eigenvalue below the configured
//! tolerance is either rejected or repaired according to [`PsdRepairPolicy`].

use super::config::{MonteCarloConfig, PsdRepairPolicy};
use super::error::MonteCarloError;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

const SYMMETRY_TOL: f64 = 1e-8;
const DIAGONAL_TOL: f64 = 1e-8;

/// Variables whose standard-normal drivers share a correlation matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationGroup {
    pub variables: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
}

impl CorrelationGroup {
    pub fn new<S: Into<String>>(variables: impl IntoIterator<Item = S>, matrix: Vec<Vec<f64>>) -> Self {
        Self { variables: variables.into_iter().map(Into::into).collect(), matrix }
    }

    /// Two variables with correlation `rho`.
    pub fn pair(a: impl Into<String>, b: impl Into<String>, rho: f64) -> Self {
        Self { variables: vec![a.into(), b.into()], matrix: vec![vec![1.0, rho], vec![rho, 1.0]] }
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Checks structure and returns the symmetrized matrix.
    pub fn validate_shape(&self) -> Result<DMatrix<f64>, MonteCarloError> {
        let n = self.variables.len();
        if n == 0 {
            return Err(MonteCarloError::group("group has no variables"));
        }
        let mut seen = HashSet::with_capacity(n);
        for v in &self.variables {
            if !seen.insert(v.as_str()) {
                return Err(MonteCarloError::group(format!("variable '{}' listed twice", v)));
            }
        }
        if self.matrix.len() != n || self.matrix.iter().any(|row| row.len() != n) {
            return Err(MonteCarloError::group(format!("matrix must be {}x{} to match the variables", n, n)));
        }

        let m = DMatrix::from_fn(n, n, |i, j| self.matrix[i][j]);
        for i in 0..n {
            for j in 0..n {
                let x = m[(i, j)];
                if !x.is_finite() {
                    return Err(MonteCarloError::group(format!("entry ({}, {}) is not finite", i, j)));
                }
                if i == j {
                    if (x - 1.0).abs() > DIAGONAL_TOL {
                        return Err(MonteCarloError::group(format!("diagonal entry {} is {}, expected 1", i, x)));
                    }
                } else {
                    if !(-1.0..=1.0).contains(&x) {
                        return Err(MonteCarloError::group(format!("entry ({}, {}) = {} is outside [-1, 1]", i, j, x)));
                    }
                    if (x - m[(j, i)]).abs() > SYMMETRY_TOL {
                        return Err(MonteCarloError::group(format!("matrix is not symmetric at ({}, {})", i, j)));
                    }
                }
            }
        }
        Ok(symmetrize(&m))
    }
}

/// Outcome of PSD validation and repair for one group.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCorrelation {
    pub matrix: DMatrix<f64>,
    pub repaired: bool,
    pub method: Option<PsdRepairPolicy>,
    pub min_eigenvalue_before: f64,
    pub min_eigenvalue_after: f64,
    pub higham_iterations: usize,
}

/// Validates `group` and, if needed, repairs it per `config`.
pub fn prepare_matrix(group: &CorrelationGroup, config: &MonteCarloConfig) -> Result<PreparedCorrelation, MonteCarloError> {
    let matrix = group.validate_shape()?;
    let before = min_eigenvalue(&matrix);
    let tolerance = config.psd_tolerance();

    if before >= tolerance {
        return Ok(PreparedCorrelation {
            matrix,
            repaired: false,
            method: None,
            min_eigenvalue_before: before,
            min_eigenvalue_after: before,
            higham_iterations: 0,
        });
    }

    let policy = config.psd_repair_policy();
    let (repaired, higham_iterations) = match policy {
        PsdRepairPolicy::Error => return Err(MonteCarloError::NotPositiveSemiDefinite { min_eigenvalue: before }),
        PsdRepairPolicy::Clip => (clip_repair(&matrix, config.psd_eigen_floor()), 0),
        PsdRepairPolicy::Higham => {
            higham_repair(&matrix, config.psd_eigen_floor(), config.higham_max_iterations(), config.higham_tolerance())
        }
    };

    let after = min_eigenvalue(&repaired);
    if !after.is_finite() || after < tolerance {
        return Err(MonteCarloError::UnableToRepairCovariance { method: policy, min_eigenvalue: after });
    }

    warn!(
        variables = ?group.variables,
        method = %policy,
        min_eigenvalue_before = before,
        min_eigenvalue_after = after,
        higham_iterations,
        "correlation matrix repaired to nearest PSD"
    );

    Ok(PreparedCorrelation {
        matrix: repaired,
        repaired: true,
        method: Some(policy),
        min_eigenvalue_before: before,
        min_eigenvalue_after: after,
        higham_iterations,
    })
}

pub fn min_eigenvalue(m: &DMatrix<f64>) -> f64 {
    m.symmetric_eigenvalues().iter().copied().fold(f64::INFINITY, f64::min)
}

/// `A` with `A Aᵀ = C`, taken from the eigen-decomposition so it also works
/// for singular (semi-definite) matrices.
pub fn sampling_factor(m: &DMatrix<f64>) -> DMatrix<f64> {
    let eig = SymmetricEigen::new(m.clone());
    let roots = eig.eigenvalues.map(|l| l.max(0.0).sqrt());
    eig.eigenvectors * DMatrix::from_diagonal(&roots)
}

fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    (m + m.transpose()) * 0.5
}

/// Nearest PSD matrix in Frobenius norm with eigenvalues floored at `floor`.
fn project_psd(m: &DMatrix<f64>, floor: f64) -> DMatrix<f64> {
    let eig = SymmetricEigen::new(symmetrize(m));
    let clipped: DVector<f64> = eig.eigenvalues.map(|l| l.max(floor));
    let v = &eig.eigenvectors;
    symmetrize(&(v * DMatrix::from_diagonal(&clipped) * v.transpose()))
}

/// `D^-1/2 M D^-1/2`, then exact ones on the diagonal.
fn rescale_unit_diagonal(m: &DMatrix<f64>) -> DMatrix<f64> {
    let n = m.nrows();
    let scale: Vec<f64> = (0..n)
        .map(|i| {
            let d = m[(i, i)];
            if d > 0.0 { 1.0 / d.sqrt() } else { 1.0 }
        })
        .collect();
    let mut out = DMatrix::from_fn(n, n, |i, j| m[(i, j)] * scale[i] * scale[j]);
    out.fill_diagonal(1.0);
    out
}

fn clip_repair(m: &DMatrix<f64>, floor: f64) -> DMatrix<f64> {
    let once = rescale_unit_diagonal(&project_psd(m, floor));
    rescale_unit_diagonal(&project_psd(&once, floor))
}

/// Alternating projections (Higham 2002) with Dykstra's correction between
/// the PSD cone and the unit-diagonal set.
fn higham_repair(m: &DMatrix<f64>, floor: f64, max_iterations: usize, tolerance: f64) -> (DMatrix<f64>, usize) {
    let n = m.nrows();
    let mut y = m.clone();
    let mut correction = DMatrix::<f64>::zeros(n, n);
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;
        let r = &y - &correction;
        let x = project_psd(&r, floor);
        correction = &x - &r;
        let mut next = x;
        next.fill_diagonal(1.0);

        let change = (&next - &y).norm() / y.norm().max(f64::EPSILON);
        y = next;
        if change <= tolerance {
            break;
        }
    }
    debug!(iterations, "higham projection finished");

    (rescale_unit_diagonal(&project_psd(&y, floor)), iterations)
}

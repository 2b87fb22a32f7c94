use super::config::PsdRepairPolicy;
use thiserror::Error;

/// Monte Carlo setup and execution failures.
///
/// Everything except `Evaluation` is raised before the first scenario runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MonteCarloError {
    #[error("Invalid configuration '{field}': {reason}")]
    InvalidConfig { field: &'static str, reason: String },
    #[error("Invalid distribution for '{variable}': {reason}")]
    InvalidDistributionSpec { variable: String, reason: String },
    #[error("Invalid correlation group: {reason}")]
    InvalidCorrelationGroup { reason: String },
    #[error("Correlation matrix is not positive semi-definite (min eigenvalue {min_eigenvalue:e})")]
    NotPositiveSemiDefinite { min_eigenvalue: f64 },
    #[error("Unable to repair correlation matrix with '{method}' (min eigenvalue {min_eigenvalue:e})")]
    UnableToRepairCovariance { method: PsdRepairPolicy, min_eigenvalue: f64 },
    #[error("Evaluator failed at iteration {iteration}: {message}")]
    Evaluation { iteration: usize, message: String },
}

impl MonteCarloError {
    pub(crate) fn group(reason: impl Into<String>) -> Self {
        MonteCarloError::InvalidCorrelationGroup { reason: reason.into() }
    }

    pub(crate) fn distribution(variable: &str, reason: impl Into<String>) -> Self {
        MonteCarloError::InvalidDistributionSpec { variable: variable.to_string(), reason: reason.into() }
    }
}

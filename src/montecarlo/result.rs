use super::config::PsdRepairPolicy;
use super::diagnostics::{ConvergenceCheck, SummaryStatistics};
use super::sampling::PsdRepairReport;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonteCarloDiagnostics {
    pub configured_iterations: usize,
    pub executed_iterations: usize,
    pub stopped_early: bool,
    pub converged: bool,
    pub sufficient_window: bool,
    pub median_delta: f64,
    pub effective_window: usize,
    pub psd_repaired: bool,
    pub psd_repair_method: Option<PsdRepairPolicy>,
    pub psd_repair_clip_used: bool,
    pub psd_repair_higham_used: bool,
    pub psd_min_eigenvalue_before: Option<f64>,
    pub psd_min_eigenvalue_after: Option<f64>,
    pub higham_iterations: usize,
}

impl MonteCarloDiagnostics {
    pub(crate) fn assemble(
        configured_iterations: usize,
        executed_iterations: usize,
        convergence: &ConvergenceCheck,
        psd: &PsdRepairReport,
    ) -> Self {
        Self {
            configured_iterations,
            executed_iterations,
            stopped_early: executed_iterations < configured_iterations,
            converged: convergence.converged,
            sufficient_window: convergence.sufficient_window,
            median_delta: convergence.median_delta,
            effective_window: convergence.effective_window,
            psd_repaired: psd.repaired,
            psd_repair_method: psd.method,
            psd_repair_clip_used: psd.clip_used,
            psd_repair_higham_used: psd.higham_used,
            psd_min_eigenvalue_before: psd.min_eigenvalue_before,
            psd_min_eigenvalue_after: psd.min_eigenvalue_after,
            higham_iterations: psd.higham_iterations,
        }
    }
}

/// Distribution summary of the executed outcomes plus run diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonteCarloResult {
    pub summary: SummaryStatistics,
    pub diagnostics: MonteCarloDiagnostics,
}

impl MonteCarloResult {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

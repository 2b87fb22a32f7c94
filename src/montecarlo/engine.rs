//! Batched Monte Carlo evaluation with early stopping.
//!
//! The RNG is only touched while sampling, which happens once and upfront for
//! the full iteration budget. Evaluation then writes each outcome into its own
//! pre-sized slot, so outcome order always matches draw order and a seeded run
//! is reproducible whether or not batches run on the rayon pool.

use super::config::MonteCarloConfig;
use super::correlation::CorrelationGroup;
use super::diagnostics::{check_convergence, ConvergenceCheck, SummaryStatistics};
use super::distribution::DistributionSpec;
use super::error::MonteCarloError;
use super::result::{MonteCarloDiagnostics, MonteCarloResult};
use super::sampling::{draw, ScenarioSamples};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt::Display;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct MonteCarloEngine {
    config: MonteCarloConfig,
}

impl MonteCarloEngine {
    pub fn new(config: MonteCarloConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MonteCarloConfig {
        &self.config
    }

    fn rng(&self) -> StdRng {
        match self.config.seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Runs only the sampling phase for the full iteration budget.
    pub fn sample(
        &self,
        distributions: &BTreeMap<String, DistributionSpec>,
        correlation_groups: &[CorrelationGroup],
    ) -> Result<ScenarioSamples, MonteCarloError> {
        let mut rng = self.rng();
        draw(&mut rng, distributions, correlation_groups, &self.config, self.config.iterations())
    }

    /// Samples, evaluates in batches until converged or out of budget, and
    /// summarizes the executed outcomes.
    ///
    /// `base_inputs` supplies every deterministic input; each scenario
    /// overrides the stochastic variables on top of it.
    ///
    /// # Errors
    ///
    /// Setup errors (distributions, groups, PSD) are returned before the
    /// evaluator is first called. An evaluator failure aborts the run with
    /// `Evaluation`.
    pub fn run<F, E>(
        &self,
        base_inputs: &BTreeMap<String, f64>,
        distributions: &BTreeMap<String, DistributionSpec>,
        evaluator: F,
        correlation_groups: &[CorrelationGroup],
    ) -> Result<MonteCarloResult, MonteCarloError>
    where
        F: Fn(&BTreeMap<String, f64>) -> Result<f64, E> + Sync,
        E: Display,
    {
        let cfg = &self.config;
        let max_iter = cfg.iterations();
        let min_iter = max_iter.min(cfg.min_iterations());
        let batch = cfg.batch_size();

        let samples = self.sample(distributions, correlation_groups)?;
        let mut outcomes = vec![0.0_f64; max_iter];
        let mut executed = 0usize;

        while executed < max_iter {
            let end = (executed + batch).min(max_iter);
            self.evaluate_batch(&samples, base_inputs, &evaluator, executed, &mut outcomes[executed..end])?;
            executed = end;

            if executed >= min_iter && executed < max_iter {
                let check = self.convergence(&outcomes[..executed]);
                debug!(
                    executed,
                    median_delta = check.median_delta,
                    effective_window = check.effective_window,
                    "batch finished"
                );
                if check.converged && check.sufficient_window {
                    info!(executed, configured = max_iter, median_delta = check.median_delta, "monte carlo converged early");
                    break;
                }
            }
        }

        let executed_outcomes = &outcomes[..executed];
        let convergence = self.convergence(executed_outcomes);
        let diagnostics = MonteCarloDiagnostics::assemble(max_iter, executed, &convergence, samples.psd_report());
        let summary = SummaryStatistics::from_outcomes(executed_outcomes);

        info!(
            executed,
            configured = max_iter,
            converged = diagnostics.converged,
            psd_repaired = diagnostics.psd_repaired,
            median = summary.median,
            "monte carlo run finished"
        );
        Ok(MonteCarloResult { summary, diagnostics })
    }

    fn convergence(&self, outcomes: &[f64]) -> ConvergenceCheck {
        check_convergence(
            outcomes,
            self.config.convergence_window(),
            self.config.dynamic_window_min(),
            self.config.convergence_tolerance(),
        )
    }

    /// Fills `slots` with outcomes for scenarios `start..start + slots.len()`.
    fn evaluate_batch<F, E>(
        &self,
        samples: &ScenarioSamples,
        base_inputs: &BTreeMap<String, f64>,
        evaluator: &F,
        start: usize,
        slots: &mut [f64],
    ) -> Result<(), MonteCarloError>
    where
        F: Fn(&BTreeMap<String, f64>) -> Result<f64, E> + Sync,
        E: Display,
    {
        let eval_one = |(offset, slot): (usize, &mut f64)| -> Result<(), MonteCarloError> {
            let iteration = start + offset;
            let inputs = samples.scenario(base_inputs, iteration);
            *slot = evaluator(&inputs)
                .map_err(|e| MonteCarloError::Evaluation { iteration, message: e.to_string() })?;
            Ok(())
        };

        if self.config.parallel() {
            slots.par_iter_mut().enumerate().try_for_each(eval_one)
        } else {
            slots.iter_mut().enumerate().try_for_each(eval_one)
        }
    }
}

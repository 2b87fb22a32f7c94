//! Correlated Monte Carlo simulation over a scalar evaluator.

pub mod config;
pub mod correlation;
pub mod diagnostics;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod result;
pub mod sampling;

pub use config::{MonteCarloConfig, MonteCarloConfigBuilder, MonteCarloSettings, PsdRepairPolicy};
pub use correlation::{prepare_matrix, CorrelationGroup, PreparedCorrelation};
pub use diagnostics::{ConvergenceCheck, SummaryStatistics};
pub use distribution::{DistributionSpec, Marginal};
pub use engine::MonteCarloEngine;
pub use error::MonteCarloError;
pub use evaluator::{graph_evaluator, scalar_inputs};
pub use result::{MonteCarloDiagnostics, MonteCarloResult};
pub use sampling::{PsdRepairReport, ScenarioSamples};

//! Valuation-computation kernel.
//!
//! Two independent pieces:
//! - [`CalculationGraph`]: a static dependency graph of pure node functions,
//!   executed in topological order with optional provenance threading.
//! - [`MonteCarloEngine`]: correlated scenario sampling plus batched,
//!   convergence-aware evaluation of any scalar evaluator (typically one
//!   `calculate` pass over a graph).

pub mod analysis;
pub mod compute;
pub mod display;
pub mod graph;
pub mod montecarlo;
pub mod provenance;
pub mod store;

pub use compute::{Entry, Formula, GraphError, Ledger, TracedValue, Value};
pub use graph::CalculationGraph;
pub use montecarlo::{
    CorrelationGroup, DistributionSpec, MonteCarloConfig, MonteCarloEngine, MonteCarloError, MonteCarloResult,
    PsdRepairPolicy,
};
pub use provenance::{Provenance, TraceableField};

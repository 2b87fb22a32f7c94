//! Bridges a [`CalculationGraph`] into a Monte Carlo evaluator.

use crate::compute::{GraphError, Ledger};
use crate::graph::CalculationGraph;
use std::collections::BTreeMap;

/// An evaluator that runs one untraced `calculate` pass per scenario and
/// returns the scalar at `output`.
///
/// Sampled variables override same-named entries of `fixed_inputs`.
pub fn graph_evaluator<'a>(
    graph: &'a CalculationGraph,
    fixed_inputs: &'a Ledger,
    output: &'a str,
) -> impl Fn(&BTreeMap<String, f64>) -> Result<f64, GraphError> + Sync + 'a {
    move |scenario: &BTreeMap<String, f64>| {
        let mut inputs = fixed_inputs.clone();
        for (name, value) in scenario {
            inputs.insert(name.as_str(), *value);
        }
        let ledger = graph.calculate(&inputs, false)?;
        let entry = ledger.get(output).ok_or_else(|| GraphError::UnknownNode { name: output.to_string() })?;
        entry.as_scalar().ok_or_else(|| GraphError::Calculation {
            node: output.to_string(),
            message: match entry.value() {
                None => "output is unresolved".to_string(),
                Some(v) => format!("output is a series of length {}, expected a scalar", v.len()),
            },
        })
    }
}

/// The scalar entries of `ledger`, suitable as `base_inputs` for a run.
pub fn scalar_inputs(ledger: &Ledger) -> BTreeMap<String, f64> {
    ledger
        .iter()
        .filter_map(|(name, entry)| entry.as_scalar().map(|v| (name.to_string(), v)))
        .collect()
}

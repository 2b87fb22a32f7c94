//! A synchronous, single-pass computation engine with lineage threading.
use super::error::GraphError;
use super::formula::Formula;
use super::ledger::{Entry, Ledger, TracedValue, Value};
use crate::store::{NodeId, NodeKind, Registry};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub(crate) const INPUT_PROVIDED: &str = "Input provided";
pub(crate) const UNTRACED_INTERMEDIATE: &str = "Untraced intermediate value";

pub struct Engine<'a> {
    registry: &'a Registry,
    formulas: &'a [Formula],
}

impl<'a> Engine<'a> {
    pub fn new(registry: &'a Registry, formulas: &'a [Formula]) -> Self {
        Self { registry, formulas }
    }

    /// Evaluates `order` (a topological order) against `inputs`.
    ///
    /// Nodes already present in the working ledger are never recomputed. A node
    /// with no function and no supplied value is left absent; whichever node
    /// consumes it then fails with `MissingDependency`.
    pub fn run(&self, order: &[NodeId], inputs: &Ledger, trace_enabled: bool) -> Result<Ledger, GraphError> {
        let mut ledger: Ledger = if trace_enabled {
            inputs
                .iter()
                .map(|(name, entry)| (name.to_string(), Self::wrap_input(name, entry)))
                .collect()
        } else {
            inputs.clone()
        };

        let mut computed = 0usize;
        for &node_id in order {
            let name = self.registry.name_of(node_id);
            if ledger.contains(name) {
                continue;
            }
            match self.registry.kinds[node_id.index()] {
                NodeKind::Leaf => {
                    debug!(node = name, "leaf not supplied; leaving unresolved");
                }
                NodeKind::Formula(idx) => {
                    let entry = self.evaluate_node(node_id, &self.formulas[idx as usize], &ledger, trace_enabled)?;
                    ledger.insert(name, entry);
                    computed += 1;
                }
            }
        }

        debug!(nodes = order.len(), computed, trace_enabled, "calculation pass finished");
        Ok(ledger)
    }

    fn wrap_input(name: &str, entry: &Entry) -> Entry {
        match entry {
            Entry::Traced(_) => entry.clone(),
            Entry::Raw(v) => TracedValue::assumed(name, v.clone(), INPUT_PROVIDED).into(),
        }
    }

    fn evaluate_node(
        &self,
        node_id: NodeId,
        formula: &Formula,
        ledger: &Ledger,
        trace_enabled: bool,
    ) -> Result<Entry, GraphError> {
        let node_name = self.registry.name_of(node_id);
        let parents = self.registry.get_parents(node_id);

        let mut args: SmallVec<[Value; 4]> = SmallVec::with_capacity(parents.len());
        let mut lineage: BTreeMap<String, Arc<TracedValue>> = BTreeMap::new();
        let mut unresolved = false;

        // 1. Resolve arguments, recording lineage for anything traceable.
        for &parent in parents {
            let param = self.registry.name_of(parent);
            let entry = ledger.get(param).ok_or_else(|| GraphError::MissingDependency {
                node: node_name.to_string(),
                param: param.to_string(),
            })?;

            match entry {
                Entry::Traced(field) => {
                    lineage.insert(param.to_string(), field.clone());
                    match field.value() {
                        Some(v) => args.push(v.clone()),
                        None => unresolved = true,
                    }
                }
                Entry::Raw(v) => {
                    if trace_enabled {
                        let wrapped = TracedValue::assumed(param, v.clone(), UNTRACED_INTERMEDIATE);
                        lineage.insert(param.to_string(), Arc::new(wrapped));
                    }
                    args.push(v.clone());
                }
            }
        }

        // 2. An unresolved input makes this node unresolved too; the lineage says why.
        if unresolved {
            let field = TracedValue::computed(node_name, None, node_name, formula.expression(), lineage);
            return Ok(field.into());
        }

        // 3. Invoke.
        let output = formula.call(&args).map_err(|message| GraphError::Calculation {
            node: node_name.to_string(),
            message,
        })?;

        // 4. Wrap.
        Ok(match output {
            Entry::Traced(_) => output,
            Entry::Raw(v) if lineage.is_empty() => Entry::Raw(v),
            Entry::Raw(v) => {
                TracedValue::computed(node_name, Some(v), node_name, formula.expression(), lineage).into()
            }
        })
    }
}

//! The `CalculationGraph`: a named, statically built dependency graph.
//!
//! Nodes are either runtime-supplied leaves or pure functions of other nodes.
//! Topology is fixed once construction is done; every `calculate` call is an
//! independent pass over that topology.

use crate::analysis::topology;
use crate::compute::{Engine, Formula, GraphError, Ledger};
use crate::store::{NodeId, NodeKind, Registry};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct CalculationGraph {
    name: String,
    registry: Registry,
    formulas: Vec<Formula>,
}

impl CalculationGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a node that must be supplied at call time.
    pub fn add_leaf(&mut self, name: &str) -> NodeId {
        let id = self.registry.ensure_node(name);
        if !self.registry.meta[id.index()].declared {
            self.registry.declare(id, NodeKind::Leaf);
        }
        id
    }

    /// Registers `name` as `formula(depends_on...)`.
    ///
    /// Dependencies that do not exist yet are created as leaves. Giving a node
    /// a second function fails with `DuplicateNode`.
    pub fn add_node(&mut self, name: &str, depends_on: &[&str], formula: Formula) -> Result<NodeId, GraphError> {
        let id = self.registry.ensure_node(name);
        if matches!(self.registry.kinds[id.index()], NodeKind::Formula(_)) {
            return Err(GraphError::DuplicateNode { name: name.to_string() });
        }

        let parents: Vec<NodeId> = depends_on.iter().map(|dep| self.registry.ensure_node(dep)).collect();
        self.registry.set_parents(id, &parents);

        let idx = self.formulas.len() as u32;
        self.formulas.push(formula);
        self.registry.declare(id, NodeKind::Formula(idx));
        Ok(id)
    }

    /// Fails with `Cycle` if the graph is not acyclic.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.execution_order().map(|_| ())
    }

    /// All nodes with no incoming edges, i.e. the values a caller must supply.
    pub fn get_inputs(&self) -> BTreeSet<String> {
        topology::inputs(&self.registry)
            .into_iter()
            .map(|id| self.registry.name_of(id).to_string())
            .collect()
    }

    /// Executes every node in topological order.
    ///
    /// With `trace_enabled`, raw inputs are wrapped as `Assumed("Input provided")`
    /// and every computed node carries `Computed` lineage. Without it, a node is
    /// still traced whenever any of its resolved dependencies is traced.
    pub fn calculate(&self, inputs: &Ledger, trace_enabled: bool) -> Result<Ledger, GraphError> {
        let order = self.execution_order()?;
        Engine::new(&self.registry, &self.formulas).run(&order, inputs, trace_enabled)
    }

    /// Like [`calculate`](Self::calculate), restricted to the upstream closure of `targets`.
    pub fn calculate_targets(
        &self,
        inputs: &Ledger,
        targets: &[&str],
        trace_enabled: bool,
    ) -> Result<Ledger, GraphError> {
        let roots = targets
            .iter()
            .map(|t| self.registry.id_of(t).ok_or_else(|| GraphError::UnknownNode { name: t.to_string() }))
            .collect::<Result<Vec<NodeId>, GraphError>>()?;
        let order = topology::order_from(&self.registry, roots).map_err(|cycle| self.cycle_error(&cycle))?;
        Engine::new(&self.registry, &self.formulas).run(&order, inputs, trace_enabled)
    }

    // --- Accessors ---

    pub fn node_count(&self) -> usize {
        self.registry.count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.id_of(name).is_some()
    }

    /// Node names in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.registry.meta.iter().map(|m| m.name.as_str())
    }

    /// Declared dependencies of `name`, in declaration order.
    pub fn dependencies(&self, name: &str) -> Option<Vec<&str>> {
        let id = self.registry.id_of(name)?;
        Some(self.registry.get_parents(id).iter().map(|&p| self.registry.name_of(p)).collect())
    }

    /// Nodes that declare `name` as a dependency, sorted by name.
    pub fn dependents(&self, name: &str) -> Option<Vec<&str>> {
        let id = self.registry.id_of(name)?;
        let mut out: Vec<&str> = self
            .registry
            .get_children(id)
            .into_iter()
            .map(|c| self.registry.name_of(c))
            .collect();
        out.sort_unstable();
        out.dedup();
        Some(out)
    }

    /// The audited expression name of a computed node.
    pub fn expression(&self, name: &str) -> Option<&str> {
        let id = self.registry.id_of(name)?;
        match self.registry.kinds[id.index()] {
            NodeKind::Formula(idx) => Some(self.formulas[idx as usize].expression()),
            NodeKind::Leaf => None,
        }
    }

    fn execution_order(&self) -> Result<Vec<NodeId>, GraphError> {
        topology::sort(&self.registry).map_err(|cycle| self.cycle_error(&cycle))
    }

    fn cycle_error(&self, cycle: &[NodeId]) -> GraphError {
        GraphError::Cycle {
            path: cycle.iter().map(|&id| self.registry.name_of(id).to_string()).collect(),
        }
    }
}

use super::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name-indexed columnar storage for the graph topology.
///
/// Parents are kept CSR-style (`parents_flat` + `parents_ranges`), children as
/// intrusive linked lists so downstream walks never allocate per node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    // Columnar Arrays
    pub kinds: Vec<NodeKind>,
    pub meta: Vec<NodeMetadata>,

    // Topology (CSR-ish + Adjacency)
    pub parents_flat: Vec<NodeId>,
    pub parents_ranges: Vec<(u32, u32)>, // (start, count)

    // Downstream traversal helpers
    pub first_child: Vec<u32>,
    pub child_targets: Vec<NodeId>,
    pub next_child: Vec<u32>,

    // Rebuilt on load
    #[serde(skip)]
    pub by_name: HashMap<String, NodeId>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }
    pub fn count(&self) -> usize { self.kinds.len() }

    /// Rebuilds the `by_name` index after deserialization.
    pub fn rebuild_name_index(&mut self) {
        self.by_name = self
            .meta
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.clone(), NodeId::new(i)))
            .collect();
    }

    #[inline]
    pub fn id_of(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    #[inline]
    pub fn name_of(&self, id: NodeId) -> &str {
        &self.meta[id.index()].name
    }

    /// Returns the node called `name`, creating an undeclared leaf if it is new.
    pub fn ensure_node(&mut self, name: &str) -> NodeId {
        if let Some(id) = self.id_of(name) {
            return id;
        }
        let id = NodeId::new(self.kinds.len());
        self.kinds.push(NodeKind::Leaf);
        self.meta.push(NodeMetadata { name: name.to_string(), declared: false });
        self.parents_ranges.push((self.parents_flat.len() as u32, 0));
        self.first_child.push(u32::MAX);
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Marks a node as explicitly registered and assigns its kind.
    pub fn declare(&mut self, id: NodeId, kind: NodeKind) {
        let idx = id.index();
        self.kinds[idx] = kind;
        self.meta[idx].declared = true;
    }

    /// Appends `parents` as the dependency list of `id`.
    ///
    /// The node's CSR range is re-pointed at the freshly appended slice; any
    /// previous range becomes unreachable. Child lists gain one edge per parent.
    pub fn set_parents(&mut self, id: NodeId, parents: &[NodeId]) {
        // 1. Register Parents
        let start = self.parents_flat.len() as u32;
        self.parents_flat.extend_from_slice(parents);
        self.parents_ranges[id.index()] = (start, parents.len() as u32);

        // 2. Register Children (Adjacency list for downstream lookups)
        for &parent in parents {
            let p_idx = parent.index();
            let head = self.first_child[p_idx];
            let new_edge = self.child_targets.len() as u32;
            self.child_targets.push(id);
            self.next_child.push(head);
            self.first_child[p_idx] = new_edge;
        }
    }

    #[inline(always)]
    pub fn get_parents(&self, id: NodeId) -> &[NodeId] {
        let (start, count) = self.parents_ranges[id.index()];
        &self.parents_flat[start as usize..(start + count) as usize]
    }

    /// Children in most-recently-linked-first order.
    pub fn get_children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut edge_idx = self.first_child[id.index()];
        while edge_idx != u32::MAX {
            out.push(self.child_targets[edge_idx as usize]);
            edge_idx = self.next_child[edge_idx as usize];
        }
        out
    }

    #[inline]
    pub fn in_degree(&self, id: NodeId) -> usize {
        self.parents_ranges[id.index()].1 as usize
    }
}

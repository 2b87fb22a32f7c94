//! Flat JSON export of a lineage DAG.
//!
//! Each distinct field (by address) becomes one row; computed rows refer to
//! their inputs by row id. Inputs always precede their consumers and the root
//! is the last row.

use super::{Provenance, TraceableField};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Serialize)]
pub struct LineageTable<'a, T> {
    pub root: usize,
    pub nodes: Vec<LineageNode<'a, T>>,
}

#[derive(Debug, Serialize)]
pub struct LineageNode<'a, T> {
    pub id: usize,
    pub name: &'a str,
    pub value: Option<&'a T>,
    pub provenance: NodeProvenance<'a>,
}

/// [`Provenance`] with computed inputs replaced by row ids.
#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum NodeProvenance<'a> {
    SourceFact { concept: &'a str, period: &'a str },
    Computed { op_code: &'a str, expression: &'a str, inputs: BTreeMap<&'a str, usize> },
    Assumed { description: &'a str, author: Option<&'a str>, timestamp: Option<&'a str> },
}

impl<T> TraceableField<T> {
    pub fn lineage_table(&self) -> LineageTable<'_, T> {
        let mut ids = HashMap::new();
        let mut nodes = Vec::new();
        let root = self.push_row(&mut ids, &mut nodes);
        LineageTable { root, nodes }
    }

    fn push_row<'a>(
        &'a self,
        ids: &mut HashMap<*const TraceableField<T>, usize>,
        nodes: &mut Vec<LineageNode<'a, T>>,
    ) -> usize {
        let key = self as *const TraceableField<T>;
        if let Some(&id) = ids.get(&key) {
            return id;
        }

        let provenance = match &self.provenance {
            Provenance::SourceFact { concept, period } => NodeProvenance::SourceFact { concept, period },
            Provenance::Computed { op_code, expression, inputs } => NodeProvenance::Computed {
                op_code,
                expression,
                inputs: inputs.iter().map(|(param, input)| (param.as_str(), input.push_row(ids, nodes))).collect(),
            },
            Provenance::Assumed { description, author, timestamp } => NodeProvenance::Assumed {
                description,
                author: author.as_deref(),
                timestamp: timestamp.as_deref(),
            },
        };

        let id = nodes.len();
        nodes.push(LineageNode { id, name: &self.name, value: self.value.as_ref(), provenance });
        ids.insert(key, id);
        id
    }
}

impl<T: Serialize> TraceableField<T> {
    /// Pretty JSON of [`lineage_table`](Self::lineage_table). Output size is
    /// linear in the number of distinct fields.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.lineage_table())
    }
}

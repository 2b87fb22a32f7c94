//! Lineage tags for audited numbers.
//!
//! Every value that reaches a report carries a [`Provenance`] saying where it
//! came from: a filed fact, a declared assumption, or a computation over other
//! traced values. Computed provenance holds the exact inputs it consumed, so
//! the lineage of any output forms a DAG that ends in facts and assumptions.

mod export;

pub use export::{LineageNode, LineageTable, NodeProvenance};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Where a traced value came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Provenance<T> {
    /// Taken verbatim from an external ground-truth record (e.g. a filing).
    SourceFact { concept: String, period: String },
    /// Derived from other traced values.
    Computed {
        op_code: String,
        expression: String,
        inputs: BTreeMap<String, Arc<TraceableField<T>>>,
    },
    /// Manually supplied or a policy default.
    Assumed {
        description: String,
        author: Option<String>,
        timestamp: Option<String>,
    },
}

impl<T> Provenance<T> {
    pub fn source_fact(concept: impl Into<String>, period: impl Into<String>) -> Self {
        Provenance::SourceFact { concept: concept.into(), period: period.into() }
    }

    pub fn assumed(description: impl Into<String>) -> Self {
        Provenance::Assumed { description: description.into(), author: None, timestamp: None }
    }

    pub fn assumed_by(
        description: impl Into<String>,
        author: impl Into<String>,
        timestamp: Option<String>,
    ) -> Self {
        Provenance::Assumed {
            description: description.into(),
            author: Some(author.into()),
            timestamp,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Provenance::Computed { .. })
    }

    /// Inputs consumed by a computed value; `None` for facts and assumptions.
    pub fn inputs(&self) -> Option<&BTreeMap<String, Arc<TraceableField<T>>>> {
        match self {
            Provenance::Computed { inputs, .. } => Some(inputs),
            _ => None,
        }
    }
}

/// A value paired with its lineage. `value == None` means "could not be
/// resolved"; the provenance then explains why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceableField<T> {
    name: String,
    value: Option<T>,
    provenance: Provenance<T>,
}

impl<T> TraceableField<T> {
    pub fn new(name: impl Into<String>, value: Option<T>, provenance: Provenance<T>) -> Self {
        Self { name: name.into(), value, provenance }
    }

    pub fn source_fact(
        name: impl Into<String>,
        value: T,
        concept: impl Into<String>,
        period: impl Into<String>,
    ) -> Self {
        Self::new(name, Some(value), Provenance::source_fact(concept, period))
    }

    pub fn assumed(name: impl Into<String>, value: T, description: impl Into<String>) -> Self {
        Self::new(name, Some(value), Provenance::assumed(description))
    }

    pub fn computed(
        name: impl Into<String>,
        value: Option<T>,
        op_code: impl Into<String>,
        expression: impl Into<String>,
        inputs: BTreeMap<String, Arc<TraceableField<T>>>,
    ) -> Self {
        let provenance = Provenance::Computed {
            op_code: op_code.into(),
            expression: expression.into(),
            inputs,
        };
        Self::new(name, value, provenance)
    }

    pub fn unresolved(name: impl Into<String>, provenance: Provenance<T>) -> Self {
        Self::new(name, None, provenance)
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn value(&self) -> Option<&T> { self.value.as_ref() }
    pub fn provenance(&self) -> &Provenance<T> { &self.provenance }
    pub fn is_resolved(&self) -> bool { self.value.is_some() }

    /// Distinct fact/assumption fields reached through `Computed.inputs`.
    ///
    /// Order is depth-first over input names. A shared sub-lineage is walked once.
    pub fn lineage_leaves(&self) -> Vec<&TraceableField<T>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect_leaves(&mut seen, &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, seen: &mut HashSet<*const TraceableField<T>>, out: &mut Vec<&'a TraceableField<T>>) {
        if !seen.insert(self as *const TraceableField<T>) {
            return;
        }
        match &self.provenance {
            Provenance::Computed { inputs, .. } => {
                for input in inputs.values() {
                    input.collect_leaves(seen, out);
                }
            }
            _ => out.push(self),
        }
    }

    /// Length of the longest path from this field down to a leaf.
    pub fn depth(&self) -> usize {
        self.depth_memo(&mut HashMap::new())
    }

    fn depth_memo(&self, memo: &mut HashMap<*const TraceableField<T>, usize>) -> usize {
        let key = self as *const TraceableField<T>;
        if let Some(&depth) = memo.get(&key) {
            return depth;
        }
        let depth = match &self.provenance {
            Provenance::Computed { inputs, .. } => 1 + inputs.values().map(|i| i.depth_memo(memo)).max().unwrap_or(0),
            _ => 0,
        };
        memo.insert(key, depth);
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revenue() -> Arc<TraceableField<f64>> {
        Arc::new(TraceableField::source_fact("revenue", 120.0, "us-gaap:Revenues", "FY2023"))
    }

    #[test]
    fn test_leaf_field_is_its_own_lineage() {
        let rev = revenue();
        let leaves = rev.lineage_leaves();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].name(), "revenue");
        assert_eq!(rev.depth(), 0);
    }

    #[test]
    fn test_shared_inputs_listed_once() {
        let rev = revenue();
        let margin = Arc::new(TraceableField::assumed("margin", 0.2, "Analyst default"));
        let ebit = Arc::new(TraceableField::computed(
            "ebit",
            Some(24.0),
            "ebit",
            "multiply",
            BTreeMap::from([("revenue".to_string(), rev.clone()), ("margin".to_string(), margin)]),
        ));
        let ratio = TraceableField::computed(
            "ebit_to_revenue",
            Some(0.2),
            "ebit_to_revenue",
            "divide",
            BTreeMap::from([("ebit".to_string(), ebit), ("revenue".to_string(), rev)]),
        );

        let names: Vec<&str> = ratio.lineage_leaves().iter().map(|f| f.name()).collect();
        // ebit consumes margin then revenue; the direct revenue input is the same field
        assert_eq!(names, vec!["margin", "revenue"]);
        assert_eq!(ratio.depth(), 2);
    }

    #[test]
    fn test_unresolved_keeps_reason() {
        let f: TraceableField<f64> =
            TraceableField::unresolved("shares_outstanding", Provenance::assumed("Not reported in filing"));
        assert!(!f.is_resolved());
        assert!(matches!(f.provenance(), Provenance::Assumed { description, .. } if description == "Not reported in filing"));
    }

    #[test]
    fn test_json_export_is_tagged() {
        let f = TraceableField::new(
            "tax_rate",
            Some(0.25),
            Provenance::assumed_by("Policy default", "valuation-desk", Some("2024-01-31".into())),
        );
        let json = f.to_json().unwrap();
        assert!(json.contains("\"kind\": \"Assumed\""));
        assert!(json.contains("valuation-desk"));

        let table: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(table["root"], 0);
        assert_eq!(table["nodes"][0]["name"], "tax_rate");
        assert_eq!(table["nodes"][0]["value"], 0.25);
    }

    #[test]
    fn test_tree_form_round_trips() {
        let rev = revenue();
        let json = serde_json::to_string(rev.as_ref()).unwrap();
        let back: TraceableField<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, rev.as_ref());
    }

    /// rev_t and cost_t both consume rev_{t-1} and cost_{t-1}: 2^t paths to
    /// each leaf, but only 2t + 2 distinct fields.
    fn diamond_chain(years: usize) -> Arc<TraceableField<f64>> {
        let mut rev = revenue();
        let mut cost = Arc::new(TraceableField::assumed("cost", 80.0, "Run-rate opex"));
        for t in 1..=years {
            let inputs = BTreeMap::from([("rev".to_string(), rev.clone()), ("cost".to_string(), cost.clone())]);
            let next_rev = Arc::new(TraceableField::computed(format!("rev_{}", t), Some(0.0), "grow", "grow", inputs.clone()));
            let next_cost = Arc::new(TraceableField::computed(format!("cost_{}", t), Some(0.0), "scale", "scale", inputs));
            rev = next_rev;
            cost = next_cost;
        }
        let inputs = BTreeMap::from([("rev".to_string(), rev), ("cost".to_string(), cost)]);
        Arc::new(TraceableField::computed("margin", Some(0.0), "margin", "subtract", inputs))
    }

    #[test]
    fn test_deep_shared_lineage_stays_linear() {
        let years = 40;
        let margin = diamond_chain(years);

        let names: Vec<&str> = margin.lineage_leaves().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["cost", "revenue"]);
        assert_eq!(margin.depth(), years + 1);

        let table = margin.lineage_table();
        assert_eq!(table.nodes.len(), 2 * years + 3);
        assert_eq!(table.root, table.nodes.len() - 1);
        for node in &table.nodes {
            if let NodeProvenance::Computed { inputs, .. } = &node.provenance {
                assert!(inputs.values().all(|&id| id < node.id));
            }
        }
        assert!(margin.to_json().unwrap().len() < 64 * 1024);
    }
}

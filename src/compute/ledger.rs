//! ledger.rs
//! Name-addressed storage for node values, raw or traced.

use crate::provenance::TraceableField;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The atomic unit of data in the engine.
/// Scalars stay inline; series are shared so lineage copies are cheap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(f64),
    Series(Arc<Vec<f64>>),
}

impl Value {
    pub fn series(values: Vec<f64>) -> Self {
        Value::Series(Arc::new(values))
    }

    pub fn len(&self) -> usize {
        match self { Value::Scalar(_) => 1, Value::Series(v) => v.len() }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `i`, broadcasting scalars and repeating the last element of short series.
    #[inline(always)]
    pub fn get_at(&self, i: usize) -> f64 {
        match self {
            Value::Scalar(s) => *s,
            Value::Series(vec) => *vec.get(i).unwrap_or_else(|| vec.last().unwrap_or(&0.0)),
        }
    }

    /// The value as a single number; a one-element series also qualifies.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(s) => Some(*s),
            Value::Series(v) if v.len() == 1 => Some(v[0]),
            Value::Series(_) => None,
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        match self { Value::Scalar(s) => vec![*s], Value::Series(s) => s.to_vec() }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Scalar(v) }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self { Value::series(v) }
}

pub type TracedValue = TraceableField<Value>;

/// A ledger slot: either a bare value or a value with lineage.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Raw(Value),
    Traced(Arc<TracedValue>),
}

impl Entry {
    pub fn is_traced(&self) -> bool {
        matches!(self, Entry::Traced(_))
    }

    /// The underlying value; `None` only for an unresolved traced field.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Entry::Raw(v) => Some(v),
            Entry::Traced(f) => f.value(),
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        self.value().and_then(Value::as_scalar)
    }

    pub fn as_traced(&self) -> Option<&Arc<TracedValue>> {
        match self {
            Entry::Traced(f) => Some(f),
            Entry::Raw(_) => None,
        }
    }
}

impl From<Value> for Entry {
    fn from(v: Value) -> Self { Entry::Raw(v) }
}

impl From<f64> for Entry {
    fn from(v: f64) -> Self { Entry::Raw(Value::Scalar(v)) }
}

impl From<Vec<f64>> for Entry {
    fn from(v: Vec<f64>) -> Self { Entry::Raw(Value::series(v)) }
}

impl From<TracedValue> for Entry {
    fn from(f: TracedValue) -> Self { Entry::Traced(Arc::new(f)) }
}

impl From<Arc<TracedValue>> for Entry {
    fn from(f: Arc<TracedValue>) -> Self { Entry::Traced(f) }
}

/// Inputs to, and results of, one `calculate` call keyed by node name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    entries: BTreeMap<String, Entry>,
}

impl Ledger {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, name: impl Into<String>, entry: impl Into<Entry>) {
        self.entries.insert(name.into(), entry.into());
    }

    /// Builder-style `insert`.
    pub fn with(mut self, name: impl Into<String>, entry: impl Into<Entry>) -> Self {
        self.insert(name, entry);
        self
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Entry::as_scalar)
    }

    pub fn traced(&self, name: &str) -> Option<&Arc<TracedValue>> {
        self.get(name).and_then(Entry::as_traced)
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, E: Into<Entry>> FromIterator<(K, E)> for Ledger {
    fn from_iter<I: IntoIterator<Item = (K, E)>>(iter: I) -> Self {
        let mut ledger = Ledger::new();
        for (k, e) in iter {
            ledger.insert(k, e);
        }
        ledger
    }
}

impl IntoIterator for Ledger {
    type Item = (String, Entry);
    type IntoIter = std::collections::btree_map::IntoIter<String, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

//! Static node records for the calculation graph.
pub mod registry;
pub mod types;

pub use registry::Registry;
pub use types::{NodeId, NodeKind, NodeMetadata};

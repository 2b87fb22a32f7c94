//! Executes the calculation graph.
pub mod engine;
pub mod error;
pub mod formula;
pub mod ledger;

pub use engine::Engine;
pub use error::GraphError;
pub use formula::Formula;
pub use ledger::{Entry, Ledger, TracedValue, Value};

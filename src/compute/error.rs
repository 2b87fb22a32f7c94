use thiserror::Error;

/// Failures raised while building or executing a calculation graph.
///
/// `calculate` is all-or-nothing: any of these aborts the call and no partial
/// ledger is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Cycle detected: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
    #[error("Node '{node}' is missing dependency '{param}'")]
    MissingDependency { node: String, param: String },
    #[error("Calculation failed at node '{node}': {message}")]
    Calculation { node: String, message: String },
    #[error("Node '{name}' already has a function")]
    DuplicateNode { name: String },
    #[error("Unknown node '{name}'")]
    UnknownNode { name: String },
}

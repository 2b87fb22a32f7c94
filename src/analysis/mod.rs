//! Structural algorithms over the node registry.
pub mod topology;

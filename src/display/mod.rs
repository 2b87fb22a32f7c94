//! Human-readable rendering of traced results.
pub mod trace;

pub use trace::format_trace;

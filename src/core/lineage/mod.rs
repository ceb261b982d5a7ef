//! Report and item lineage
//!
//! - [`closure`] - generic breadth-first fixed point used by in-process walks
//! - [`graph`] - [`ReportGraph`], the read-side lineage queries

pub mod closure;
pub mod graph;

pub use closure::{walk, Reached, WalkLimits};
pub use graph::{ReportGraph, DEFAULT_MAX_DEPTH, DEFAULT_QUERY_TIMEOUT};

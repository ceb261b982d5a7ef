//! Lineage store abstraction layer
//!
//! This module provides the trait implemented by every storage backend and a
//! factory that picks the backend from configuration.

pub mod factory;
pub mod traits;

pub use factory::create_lineage_store;
pub use traits::{LineageStore, StepOutput};

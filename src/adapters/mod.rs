//! External system integrations for Courier.
//!
//! This module provides adapters for the collaborators the routing core
//! consumes through narrow interfaces:
//!
//! - [`database`] - Lineage store abstraction (trait-based) and factory
//! - [`postgresql`] - PostgreSQL lineage store using recursive queries
//! - [`memory`] - In-memory lineage store for dry runs and tests
//! - [`fhir`] - Bundle decoding and filter expression evaluation
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies and
//! enable testing with in-memory implementations.
//!
//! ```rust
//! use courier::adapters::database::LineageStore;
//! use courier::adapters::memory::InMemoryLineageStore;
//! use std::sync::Arc;
//!
//! let store: Arc<dyn LineageStore + Send + Sync> = Arc::new(InMemoryLineageStore::new());
//! assert_eq!(store.backend_name(), "memory");
//! ```

pub mod database;
pub mod fhir;
pub mod memory;
pub mod postgresql;

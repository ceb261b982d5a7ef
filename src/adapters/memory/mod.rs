//! In-memory lineage store adapter

pub mod store;

pub use store::InMemoryLineageStore;

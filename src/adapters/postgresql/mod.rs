//! PostgreSQL lineage store
//!
//! This module stores reports, report lineage and item lineage in PostgreSQL
//! and answers graph walks with recursive queries.

pub mod adapter;
pub mod client;
pub mod models;

pub use adapter::PostgreSQLAdapter;
pub use client::PostgreSQLClient;
pub use models::ReportRow;

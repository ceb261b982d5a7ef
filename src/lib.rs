// Courier - Report Lineage and Receiver Routing
// Copyright (c) 2025 Courier Contributors
// Licensed under the MIT License

//! # Courier - Report Lineage and Receiver Routing
//!
//! Courier tracks how reports move through a multi-step routing pipeline and
//! decides which receivers each item is routed to.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Tracing** report lineage: ancestor and descendant walks, root reports
//!   and the submitted item behind any derived item
//! - **Filtering** bundles per receiver across four ordered filter categories
//! - **Emitting** business events whose lineage fields are resolved at build time
//! - **Dispatching** events immediately or after the step's lineage write commits
//!
//! ## Architecture
//!
//! Courier follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (lineage, filter, events, pipeline)
//! - [`adapters`] - External integrations (PostgreSQL, in-memory store, bundle evaluation)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and telemetry sinks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courier::adapters::database::create_lineage_store;
//! use courier::config::load_config;
//! use courier::core::events::EventService;
//! use courier::core::lineage::ReportGraph;
//! use courier::logging::create_telemetry_sink;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("courier.toml")?;
//!
//!     let store = create_lineage_store(&config).await?;
//!     let graph = ReportGraph::new(store)
//!         .with_max_depth(config.lineage.max_depth)
//!         .with_query_timeout(config.lineage.query_timeout());
//!
//!     let events = EventService::new(graph.clone(), create_telemetry_sink(&config)?);
//!     println!("{events:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Courier uses the [`domain::CourierError`] type for all errors. Read-side
//! lineage queries degrade to empty results instead of failing; writes and
//! strict filter evaluation return errors.
//!
//! ```rust,no_run
//! use courier::domain::CourierError;
//!
//! fn example() -> Result<(), CourierError> {
//!     let config = courier::config::load_config("courier.toml")?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;

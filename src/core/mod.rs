//! Core business logic for Courier.
//!
//! # Modules
//!
//! - [`lineage`] - Ancestor and descendant walks over the report graph
//! - [`filter`] - Receiver filter evaluation and routing outcomes
//! - [`events`] - Business event construction and dispatch
//! - [`pipeline`] - Step units of work that tie the three together
//!
//! # Step Workflow
//!
//! A pipeline step run follows the same shape every time:
//!
//! 1. **Evaluate**: Decide what happens to each item (filters, routing)
//! 2. **Record**: Add output reports and their lineage to a [`pipeline::StepExecution`]
//! 3. **Queue**: Raise business events against the execution's pending queue
//! 4. **Commit**: Persist reports and edges in one transaction
//! 5. **Flush**: Send the queued events in the order they were raised
//!
//! Events are built at flush time, so lineage lookups see the committed edges.

pub mod events;
pub mod filter;
pub mod lineage;
pub mod pipeline;

//! Domain models and types for Courier.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`ReportId`], [`Topic`], [`PipelineStep`])
//! - **Domain models** ([`Report`], [`LineageEdge`], [`ItemLineage`], [`Bundle`], [`Receiver`])
//! - **Error types** ([`CourierError`], [`LineageError`], [`FilterError`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Report identifiers are UUID newtypes, so they cannot be confused with
//! tracking ids or receiver names:
//!
//! ```rust
//! use courier::domain::{ReportId, Topic};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let report_id = ReportId::new();
//! let topic = Topic::new("full-elr")?;
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod errors;
pub mod ids;
pub mod lineage;
pub mod receiver;
pub mod report;
pub mod result;

// Re-export commonly used types for convenience
pub use bundle::{
    is_aoe_only, mapped_condition_codes, Bundle, ObservationSummary, AOE_CONDITION_CODE,
    CONDITION_CODE_EXTENSION_URL,
};
pub use errors::{CourierError, FilterError, LineageError};
pub use ids::{PipelineStep, ReportId, Topic};
pub use lineage::{ItemAncestorGraph, ItemGraphRow, ItemLineage, ItemRef, LineageEdge, LineageNode};
pub use receiver::{
    CustomerStatus, FilterExpressions, FilterType, Organization, Receiver, ReceiverFilter,
    TopicFilters,
};
pub use report::{Report, ReportBuilder};
pub use result::Result;

//! Receiver filter evaluation
//!
//! # Example
//!
//! ```rust
//! use courier::adapters::fhir::PathExpressionEvaluator;
//! use courier::core::filter::{EvaluationMode, FilterEngine};
//! use courier::domain::{Bundle, FilterExpressions, Receiver, Topic};
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = FilterEngine::new(Arc::new(PathExpressionEvaluator::new()));
//! let receiver = Receiver {
//!     organization: "me-phd".to_string(),
//!     name: "elr".to_string(),
//!     topic: Topic::new("full-elr")?,
//!     customer_status: Default::default(),
//!     filters: FilterExpressions {
//!         jurisdictional_filter: vec!["state = 'ME'".to_string()],
//!         ..Default::default()
//!     },
//!     reverse_the_quality_filter: false,
//! };
//!
//! let mut bundle = Bundle::new(serde_json::json!({"resourceType": "Bundle", "state": "ME"}))?;
//! let failures = engine.evaluate_receiver_filters(&receiver, &mut bundle, EvaluationMode::Collecting)?;
//! assert!(failures.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod result;

pub use engine::{FilterEngine, ALLOW_NONE};
pub use result::{
    describe_failures, EvaluationMode, FailureKind, FilterFailure, NotRouted, RoutingOutcome,
};

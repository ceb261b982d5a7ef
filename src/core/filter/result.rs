//! Filter evaluation results

use crate::domain::{Bundle, FilterType, Receiver};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a filter evaluation failure is surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluationMode {
    /// Any failure is returned as [`FilterError::Rejected`](crate::domain::FilterError::Rejected)
    Strict,

    /// Failures are returned as data for the caller to act on
    #[default]
    Collecting,
}

/// Why an expression failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// The expression evaluated to false
    Failed,

    /// The expression could not be evaluated to a boolean
    Invalid { reason: String },
}

/// One failing filter expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterFailure {
    pub filter_type: FilterType,
    pub expression: String,
    #[serde(flatten)]
    pub kind: FailureKind,
    pub message: String,
}

impl FilterFailure {
    pub fn failed(receiver: &Receiver, filter_type: FilterType, expression: &str) -> Self {
        Self {
            filter_type,
            expression: expression.to_string(),
            kind: FailureKind::Failed,
            message: format!(
                "Item was not routed to {} because it did not pass the {}. Item failed on: {}",
                receiver.full_name(),
                filter_type,
                expression
            ),
        }
    }

    pub fn invalid(
        receiver: &Receiver,
        filter_type: FilterType,
        expression: &str,
        reason: impl Into<String>,
    ) -> Self {
        let reason = reason.into();
        Self {
            filter_type,
            expression: expression.to_string(),
            message: format!(
                "Item was not routed to {} because the {} expression is invalid. \
                 Invalid filter: {} ({})",
                receiver.full_name(),
                filter_type,
                expression,
                reason
            ),
            kind: FailureKind::Invalid { reason },
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self.kind, FailureKind::Invalid { .. })
    }
}

impl fmt::Display for FilterFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::Failed => write!(f, "{}: {}", self.filter_type, self.expression),
            FailureKind::Invalid { reason } => write!(
                f,
                "{}: {} (invalid: {})",
                self.filter_type, self.expression, reason
            ),
        }
    }
}

/// A receiver the bundle was not routed to
#[derive(Debug, Clone, PartialEq)]
pub struct NotRouted {
    pub receiver: Receiver,
    pub failures: Vec<FilterFailure>,
}

impl NotRouted {
    /// Filter type of the first failure, which is the earliest failing category
    pub fn first_filter_type(&self) -> Option<FilterType> {
        self.failures.first().map(|f| f.filter_type)
    }
}

/// Outcome of evaluating a bundle against every receiver of a topic
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingOutcome {
    /// Identifier of the evaluated bundle
    pub bundle_id: String,

    pub routed: Vec<Receiver>,

    /// Bundle as delivered to each routed receiver, in `routed` order
    pub routed_bundles: Vec<Bundle>,

    pub not_routed: Vec<NotRouted>,
}

impl RoutingOutcome {
    pub fn routed_names(&self) -> Vec<String> {
        self.routed.iter().map(Receiver::full_name).collect()
    }

    pub fn is_routed_anywhere(&self) -> bool {
        !self.routed.is_empty()
    }
}

/// Formats failures as `TYPE: expression` entries joined with `; `
pub fn describe_failures(failures: &[FilterFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

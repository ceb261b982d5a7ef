//! Receiver filter evaluation
//!
//! Categories are evaluated in a fixed order (jurisdictional, quality,
//! processing mode, condition) and every category is evaluated even when an
//! earlier one failed, so a rejection lists every reason at once.
//!
//! Condition filters are evaluated per observation with `%resource` bound to
//! it. An observation is kept when any expression matches. Observations that
//! match nothing are pruned from the bundle, and the filter fails when
//! nothing but AOE questions would remain.

use super::result::{describe_failures, EvaluationMode, FilterFailure, NotRouted, RoutingOutcome};
use crate::adapters::fhir::ExpressionEvaluator;
use crate::domain::{
    is_aoe_only, mapped_condition_codes, Bundle, FilterError, FilterType, Organization, Receiver,
    ReceiverFilter, Result, Topic,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Expression recorded when a receiver has no jurisdictional filter
pub const ALLOW_NONE: &str = "allowNone()";

/// Evaluates receiver filters against bundles
#[derive(Clone)]
pub struct FilterEngine {
    evaluator: Arc<dyn ExpressionEvaluator>,
    organizations: HashMap<String, Organization>,
}

impl FilterEngine {
    pub fn new(evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self {
            evaluator,
            organizations: HashMap::new(),
        }
    }

    /// Registers organizations whose topic filters apply to their receivers
    pub fn with_organizations(mut self, organizations: impl IntoIterator<Item = Organization>) -> Self {
        self.organizations
            .extend(organizations.into_iter().map(|org| (org.name.clone(), org)));
        self
    }

    /// Evaluates every filter category of `receiver` against `bundle`
    ///
    /// A bundle without an identifier is assigned one in place before
    /// evaluation, so the caller's bundle is modified. When the condition
    /// filter passes, observations it did not keep are removed from `bundle`;
    /// evaluate a clone when the same bundle goes to several receivers.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::MisconfiguredConditionFilters`] in either mode
    /// when both condition and mapped condition filters apply. In
    /// [`EvaluationMode::Strict`], any failure is returned as
    /// [`FilterError::Rejected`] naming each failing filter type and
    /// expression. In [`EvaluationMode::Collecting`] failures are returned
    /// as data.
    pub fn evaluate_receiver_filters(
        &self,
        receiver: &Receiver,
        bundle: &mut Bundle,
        mode: EvaluationMode,
    ) -> Result<Vec<FilterFailure>> {
        let bundle_id = bundle.ensure_identifier();
        let organization = self.organizations.get(&receiver.organization);

        if receiver.has_conflicting_condition_filters(organization) {
            return Err(FilterError::MisconfiguredConditionFilters {
                receiver: receiver.full_name(),
            }
            .into());
        }

        let mut failures = Vec::new();
        for filter in receiver.filters_in_order(organization) {
            failures.extend(self.evaluate_category(receiver, &filter, bundle));
        }

        for failure in &failures {
            tracing::debug!(
                receiver = %receiver.full_name(),
                bundle_id = %bundle_id,
                filter_type = %failure.filter_type,
                expression = %failure.expression,
                invalid = failure.is_invalid(),
                "Filter failed"
            );
        }

        if mode == EvaluationMode::Strict && !failures.is_empty() {
            return Err(FilterError::Rejected {
                receiver: receiver.full_name(),
                details: describe_failures(&failures),
            }
            .into());
        }

        Ok(failures)
    }

    fn evaluate_category(
        &self,
        receiver: &Receiver,
        filter: &ReceiverFilter,
        bundle: &mut Bundle,
    ) -> Vec<FilterFailure> {
        let filter_type = filter.filter_type();
        let expressions = filter.expressions();

        match filter {
            ReceiverFilter::Condition(expressions) if !expressions.is_empty() => {
                return self.evaluate_conditions(receiver, expressions, bundle);
            }
            ReceiverFilter::MappedCondition(codes) if !codes.is_empty() => {
                return evaluate_mapped_conditions(receiver, codes, bundle);
            }
            _ => {}
        }

        if expressions.is_empty() {
            return match filter_type {
                FilterType::JurisdictionalFilter => {
                    vec![FilterFailure::failed(receiver, filter_type, ALLOW_NONE)]
                }
                _ => Vec::new(),
            };
        }

        let mut failed = Vec::new();
        let mut invalid = Vec::new();
        for expression in expressions {
            match self.evaluator.evaluate_condition(bundle, expression) {
                Ok(true) => {}
                Ok(false) => failed.push(FilterFailure::failed(receiver, filter_type, expression)),
                Err(e) => invalid.push(invalid_failure(receiver, filter_type, expression, e)),
            }
        }

        if let ReceiverFilter::Quality { reverse: true, .. } = filter {
            // A reversed quality filter passes only bundles the expressions reject
            if failed.is_empty() && invalid.is_empty() {
                let reversed = negate(expressions);
                return vec![FilterFailure::failed(receiver, filter_type, &reversed)];
            }
            return invalid;
        }

        failed.extend(invalid);
        failed
    }

    fn evaluate_conditions(
        &self,
        receiver: &Receiver,
        expressions: &[String],
        bundle: &mut Bundle,
    ) -> Vec<FilterFailure> {
        let filter_type = FilterType::ConditionFilter;
        let mut kept = Vec::new();
        let mut invalid: Vec<FilterFailure> = Vec::new();

        for index in 0..bundle.observation_count() {
            let view = bundle.observation_view(index);
            let Some(observation) = view.observations().first().copied() else {
                continue;
            };

            let mut matched = false;
            for expression in expressions {
                match self
                    .evaluator
                    .evaluate_condition_in(&view, observation, expression)
                {
                    Ok(true) => matched = true,
                    Ok(false) => {}
                    Err(e) => {
                        if !invalid.iter().any(|f| &f.expression == expression) {
                            invalid.push(invalid_failure(receiver, filter_type, expression, e));
                        }
                    }
                }
            }
            if matched {
                kept.push((index, is_aoe_only(observation)));
            }
        }

        if kept.iter().all(|(_, aoe)| *aoe) {
            let mut failures: Vec<FilterFailure> = expressions
                .iter()
                .filter(|expression| !invalid.iter().any(|f| &f.expression == *expression))
                .map(|expression| FilterFailure::failed(receiver, filter_type, expression))
                .collect();
            failures.extend(invalid);
            return failures;
        }

        prune(receiver, bundle, &kept);
        invalid
    }
}

fn evaluate_mapped_conditions(
    receiver: &Receiver,
    codes: &[String],
    bundle: &mut Bundle,
) -> Vec<FilterFailure> {
    let kept: Vec<(usize, bool)> = bundle
        .observations()
        .into_iter()
        .enumerate()
        .filter(|(_, observation)| {
            mapped_condition_codes(observation)
                .iter()
                .any(|code| codes.contains(code))
        })
        .map(|(index, observation)| (index, is_aoe_only(observation)))
        .collect();

    if kept.iter().all(|(_, aoe)| *aoe) {
        return codes
            .iter()
            .map(|code| FilterFailure::failed(receiver, FilterType::MappedConditionFilter, code))
            .collect();
    }

    prune(receiver, bundle, &kept);
    Vec::new()
}

/// Keeps the observations at the listed positions; the flag marks AOE-only ones
fn prune(receiver: &Receiver, bundle: &mut Bundle, kept: &[(usize, bool)]) {
    let positions: Vec<usize> = kept.iter().map(|(index, _)| *index).collect();
    let removed = bundle.retain_observations(&positions);
    if removed > 0 {
        tracing::info!(
            receiver = %receiver.full_name(),
            kept = kept.len(),
            removed,
            "Observations were filtered from the bundle"
        );
    }
}

fn invalid_failure(
    receiver: &Receiver,
    filter_type: FilterType,
    expression: &str,
    error: FilterError,
) -> FilterFailure {
    let reason = match error {
        FilterError::InvalidExpression { reason, .. } => reason,
        other => other.to_string(),
    };
    FilterFailure::invalid(receiver, filter_type, expression, reason)
}

/// `(a and b).not()`, which the evaluator can parse back
fn negate(expressions: &[String]) -> String {
    format!("({}).not()", expressions.join(" and "))
}

impl FilterEngine {
    /// Routes `bundle` across every active receiver subscribed to `topic`
    ///
    /// Assigns a missing bundle identifier in place. Each receiver is
    /// evaluated against its own copy, so pruning for one receiver never
    /// affects another.
    pub fn route_bundle(
        &self,
        receivers: &[Receiver],
        bundle: &mut Bundle,
        topic: &Topic,
    ) -> RoutingOutcome {
        let bundle_id = bundle.ensure_identifier();
        let mut outcome = RoutingOutcome {
            bundle_id: bundle_id.clone(),
            ..Default::default()
        };

        for receiver in receivers
            .iter()
            .filter(|receiver| &receiver.topic == topic && receiver.is_active())
        {
            let mut copy = bundle.clone();
            match self.evaluate_receiver_filters(receiver, &mut copy, EvaluationMode::Collecting) {
                Ok(failures) if failures.is_empty() => {
                    outcome.routed.push(receiver.clone());
                    outcome.routed_bundles.push(copy);
                }
                Ok(failures) => outcome.not_routed.push(NotRouted {
                    receiver: receiver.clone(),
                    failures,
                }),
                Err(e) => {
                    // Misconfigured receivers are skipped
                    tracing::warn!(receiver = %receiver.full_name(), error = %e, "Filter evaluation failed");
                }
            }
        }

        tracing::info!(
            bundle_id = %bundle_id,
            topic = %topic,
            routed = outcome.routed.len(),
            not_routed = outcome.not_routed.len(),
            "Routed bundle"
        );

        outcome
    }
}

impl std::fmt::Debug for FilterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterEngine")
            .field("organizations", &self.organizations.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

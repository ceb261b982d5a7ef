//! Receiver and organization settings
//!
//! Receivers are configured downstream destinations. Each carries its own
//! filter expressions per category; organizations can add filters that apply
//! to every receiver of theirs on a given topic.

use super::ids::Topic;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Filter category, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterType {
    JurisdictionalFilter,
    QualityFilter,
    ProcessingModeFilter,
    ConditionFilter,
    MappedConditionFilter,
}

impl FilterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterType::JurisdictionalFilter => "JURISDICTIONAL_FILTER",
            FilterType::QualityFilter => "QUALITY_FILTER",
            FilterType::ProcessingModeFilter => "PROCESSING_MODE_FILTER",
            FilterType::ConditionFilter => "CONDITION_FILTER",
            FilterType::MappedConditionFilter => "MAPPED_CONDITION_FILTER",
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One filter category with its expressions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverFilter {
    Jurisdictional(Vec<String>),
    Quality { expressions: Vec<String>, reverse: bool },
    ProcessingMode(Vec<String>),
    /// Expressions evaluated per observation
    Condition(Vec<String>),
    /// Condition codes matched against each observation's mapped conditions
    MappedCondition(Vec<String>),
}

impl ReceiverFilter {
    pub fn filter_type(&self) -> FilterType {
        match self {
            ReceiverFilter::Jurisdictional(_) => FilterType::JurisdictionalFilter,
            ReceiverFilter::Quality { .. } => FilterType::QualityFilter,
            ReceiverFilter::ProcessingMode(_) => FilterType::ProcessingModeFilter,
            ReceiverFilter::Condition(_) => FilterType::ConditionFilter,
            ReceiverFilter::MappedCondition(_) => FilterType::MappedConditionFilter,
        }
    }

    pub fn expressions(&self) -> &[String] {
        match self {
            ReceiverFilter::Jurisdictional(expressions)
            | ReceiverFilter::Quality { expressions, .. }
            | ReceiverFilter::ProcessingMode(expressions)
            | ReceiverFilter::Condition(expressions)
            | ReceiverFilter::MappedCondition(expressions) => expressions,
        }
    }
}

/// Filter expressions grouped by category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterExpressions {
    #[serde(default)]
    pub jurisdictional_filter: Vec<String>,

    #[serde(default)]
    pub quality_filter: Vec<String>,

    #[serde(default)]
    pub processing_mode_filter: Vec<String>,

    #[serde(default)]
    pub condition_filter: Vec<String>,

    #[serde(default)]
    pub mapped_condition_filter: Vec<String>,
}

impl FilterExpressions {
    pub fn is_empty(&self) -> bool {
        self.jurisdictional_filter.is_empty()
            && self.quality_filter.is_empty()
            && self.processing_mode_filter.is_empty()
            && self.condition_filter.is_empty()
            && self.mapped_condition_filter.is_empty()
    }

    /// Every expression and mapped code across categories
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.jurisdictional_filter
            .iter()
            .chain(&self.quality_filter)
            .chain(&self.processing_mode_filter)
            .chain(&self.condition_filter)
            .chain(&self.mapped_condition_filter)
    }
}

/// Organization-wide filters that apply to one topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicFilters {
    pub topic: Topic,

    #[serde(flatten)]
    pub filters: FilterExpressions,
}

/// An organization owning receivers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub filters: Vec<TopicFilters>,
}

impl Organization {
    /// Organization filters for a topic, if any
    pub fn filters_for(&self, topic: &Topic) -> Option<&FilterExpressions> {
        self.filters
            .iter()
            .find(|f| &f.topic == topic)
            .map(|f| &f.filters)
    }
}

/// Onboarding status of a receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    #[default]
    Active,
    Testing,
    Inactive,
}

/// A configured downstream destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    /// Owning organization name; filled from the enclosing organization
    /// when receivers are nested in configuration
    #[serde(default)]
    pub organization: String,

    /// Receiver name within the organization
    pub name: String,

    /// Topic this receiver subscribes to
    pub topic: Topic,

    #[serde(default)]
    pub customer_status: CustomerStatus,

    #[serde(flatten)]
    pub filters: FilterExpressions,

    /// Invert the outcome of the quality filter
    #[serde(default)]
    pub reverse_the_quality_filter: bool,
}

impl Receiver {
    /// `organization.name`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.organization, self.name)
    }

    pub fn is_active(&self) -> bool {
        self.customer_status != CustomerStatus::Inactive
    }

    /// The receiver's filter categories in evaluation order
    ///
    /// Organization filters for the receiver's topic come first in each
    /// category. The last slot holds the mapped condition filter when no
    /// condition expressions are configured.
    pub fn filters_in_order(&self, organization: Option<&Organization>) -> [ReceiverFilter; 4] {
        let org_filters = organization.and_then(|org| org.filters_for(&self.topic));
        let merge = |org: Option<&Vec<String>>, own: &Vec<String>| -> Vec<String> {
            org.into_iter().flatten().chain(own).cloned().collect()
        };

        [
            ReceiverFilter::Jurisdictional(merge(
                org_filters.map(|f| &f.jurisdictional_filter),
                &self.filters.jurisdictional_filter,
            )),
            ReceiverFilter::Quality {
                expressions: merge(
                    org_filters.map(|f| &f.quality_filter),
                    &self.filters.quality_filter,
                ),
                reverse: self.reverse_the_quality_filter,
            },
            ReceiverFilter::ProcessingMode(merge(
                org_filters.map(|f| &f.processing_mode_filter),
                &self.filters.processing_mode_filter,
            )),
            self.condition_slot(organization),
        ]
    }

    fn condition_slot(&self, organization: Option<&Organization>) -> ReceiverFilter {
        let (conditions, mapped) = self.condition_filters(organization);
        if conditions.is_empty() && !mapped.is_empty() {
            ReceiverFilter::MappedCondition(mapped)
        } else {
            ReceiverFilter::Condition(conditions)
        }
    }

    fn condition_filters(&self, organization: Option<&Organization>) -> (Vec<String>, Vec<String>) {
        let org_filters = organization.and_then(|org| org.filters_for(&self.topic));
        let conditions = org_filters
            .map(|f| &f.condition_filter)
            .into_iter()
            .flatten()
            .chain(&self.filters.condition_filter)
            .cloned()
            .collect();
        let mapped = org_filters
            .map(|f| &f.mapped_condition_filter)
            .into_iter()
            .flatten()
            .chain(&self.filters.mapped_condition_filter)
            .cloned()
            .collect();
        (conditions, mapped)
    }

    /// Whether both condition and mapped condition filters apply
    pub fn has_conflicting_condition_filters(&self, organization: Option<&Organization>) -> bool {
        let (conditions, mapped) = self.condition_filters(organization);
        !conditions.is_empty() && !mapped.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.organization.trim().is_empty() {
            return Err("receiver.organization cannot be empty".to_string());
        }
        if self.name.trim().is_empty() || self.name.contains('.') {
            return Err(format!(
                "receiver.name '{}' must be non-empty and must not contain '.'",
                self.name
            ));
        }
        if self.has_conflicting_condition_filters(None) {
            return Err(format!(
                "receiver {} sets both condition_filter and mapped_condition_filter; use only one",
                self.full_name()
            ));
        }
        if let Some(blank) = self.filters.all().find(|e| e.trim().is_empty()) {
            return Err(format!(
                "receiver {} has a blank filter expression '{}'",
                self.full_name(),
                blank
            ));
        }
        Ok(())
    }
}

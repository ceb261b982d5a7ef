//! Business event values

use crate::domain::{PipelineStep, ReportId, Topic};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Every business event the pipeline emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStreamEventName {
    ReportReceived,
    ReportAccepted,
    ReportRouted,
    ReportNotRouted,
    ReportSent,
    ReportProcessingError,
    ItemAccepted,
    ItemRouted,
    ItemNotRouted,
    ItemFilterFailed,
    ItemFailedValidation,
    ItemTransformed,
    ItemSent,
    ItemProcessingError,
    SubmissionProcessingError,
}

impl ReportStreamEventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReportReceived => "REPORT_RECEIVED",
            Self::ReportAccepted => "REPORT_ACCEPTED",
            Self::ReportRouted => "REPORT_ROUTED",
            Self::ReportNotRouted => "REPORT_NOT_ROUTED",
            Self::ReportSent => "REPORT_SENT",
            Self::ReportProcessingError => "REPORT_PROCESSING_ERROR",
            Self::ItemAccepted => "ITEM_ACCEPTED",
            Self::ItemRouted => "ITEM_ROUTED",
            Self::ItemNotRouted => "ITEM_NOT_ROUTED",
            Self::ItemFilterFailed => "ITEM_FILTER_FAILED",
            Self::ItemFailedValidation => "ITEM_FAILED_VALIDATION",
            Self::ItemTransformed => "ITEM_TRANSFORMED",
            Self::ItemSent => "ITEM_SENT",
            Self::ItemProcessingError => "ITEM_PROCESSING_ERROR",
            Self::SubmissionProcessingError => "SUBMISSION_PROCESSING_ERROR",
        }
    }
}

impl fmt::Display for ReportStreamEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known event property keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventProperty {
    ProcessingError,
    ItemFormat,
    ValidationProfile,
    FailingFilters,
    FilterType,
    Filename,
    TransportType,
    ReceiverName,
    RequestParameters,
    SenderIp,
    FileLength,
    SenderName,
    BundleDigest,
    ObservationSummary,
}

impl EventProperty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessingError => "processingError",
            Self::ItemFormat => "itemFormat",
            Self::ValidationProfile => "validationProfile",
            Self::FailingFilters => "failingFilters",
            Self::FilterType => "filterType",
            Self::Filename => "filename",
            Self::TransportType => "transportType",
            Self::ReceiverName => "receiverName",
            Self::RequestParameters => "requestParameters",
            Self::SenderIp => "senderIp",
            Self::FileLength => "fileLength",
            Self::SenderName => "senderName",
            Self::BundleDigest => "bundleDigest",
            Self::ObservationSummary => "observationSummary",
        }
    }
}

impl fmt::Display for EventProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lineage position of a report-scoped event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEventData {
    pub child_report_id: ReportId,
    pub parent_report_id: Option<ReportId>,
    pub submitted_report_ids: Vec<ReportId>,
    pub topic: Option<Topic>,
    pub blob_url: String,
    pub pipeline_step_name: PipelineStep,
    pub timestamp: DateTime<Utc>,
}

/// Item position of an item-scoped event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemEventData {
    pub child_item_index: i32,
    pub parent_item_index: i32,
    pub submitted_item_index: Option<i32>,
    pub tracking_id: Option<String>,
    pub sender: Option<String>,
}

/// A built business event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessEvent {
    pub name: ReportStreamEventName,
    pub report: ReportEventData,
    pub item: Option<ItemEventData>,
    pub params: BTreeMap<EventProperty, Value>,
}

impl BusinessEvent {
    pub fn is_item_event(&self) -> bool {
        self.item.is_some()
    }

    pub fn param(&self, property: EventProperty) -> Option<&Value> {
        self.params.get(&property)
    }

    /// Flat property map for telemetry sinks
    ///
    /// Report fields, then item fields, then params under their own keys.
    pub fn to_properties(&self) -> Map<String, Value> {
        let mut properties = Map::new();
        flatten_into(&mut properties, serde_json::to_value(&self.report));
        if let Some(item) = &self.item {
            flatten_into(&mut properties, serde_json::to_value(item));
        }
        for (property, value) in &self.params {
            properties.insert(property.as_str().to_string(), value.clone());
        }
        properties
    }
}

fn flatten_into(properties: &mut Map<String, Value>, value: serde_json::Result<Value>) {
    if let Ok(Value::Object(fields)) = value {
        properties.extend(fields);
    }
}

//! Report domain model
//!
//! A report is the immutable output of one pipeline step. Reports are
//! created exactly once and never updated or deleted.

use super::ids::{PipelineStep, ReportId, Topic};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable unit of output from one pipeline step
///
/// # Examples
///
/// ```
/// use courier::domain::report::Report;
/// use courier::domain::ids::{PipelineStep, Topic};
///
/// let report = Report::builder()
///     .topic(Topic::new("full-elr").unwrap())
///     .pipeline_step(PipelineStep::Receive)
///     .body_location("receive/simple-report.fhir")
///     .sender("simple_report", "default")
///     .build()
///     .unwrap();
///
/// assert_eq!(report.item_count, 1);
/// assert_eq!(report.sender_name().as_deref(), Some("simple_report.default"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Unique identifier
    pub report_id: ReportId,

    /// Routing domain tag
    pub topic: Topic,

    /// Opaque reference to the stored body
    pub body_location: String,

    /// Number of items in the body
    pub item_count: i32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Step that produced this report
    pub pipeline_step: PipelineStep,

    /// Submitting organization (submitted reports only)
    pub sending_org: Option<String>,

    /// Submitting organization client (submitted reports only)
    pub sending_org_client: Option<String>,

    /// Receiving organization (receiver-addressed reports only)
    pub receiving_org: Option<String>,

    /// Receiving organization service (receiver-addressed reports only)
    pub receiving_org_svc: Option<String>,
}

impl Report {
    /// Creates a new builder for constructing a Report
    pub fn builder() -> ReportBuilder {
        ReportBuilder::default()
    }

    /// Sender identity in `org.client` form, when both parts are present
    pub fn sender_name(&self) -> Option<String> {
        match (&self.sending_org, &self.sending_org_client) {
            (Some(org), Some(client)) => Some(format!("{org}.{client}")),
            _ => None,
        }
    }

    /// Receiver identity in `org.service` form, when both parts are present
    pub fn receiver_name(&self) -> Option<String> {
        match (&self.receiving_org, &self.receiving_org_svc) {
            (Some(org), Some(svc)) => Some(format!("{org}.{svc}")),
            _ => None,
        }
    }

    /// Whether the report carries no items (a filtered-out terminal report)
    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }
}

/// Builder for constructing Report instances
#[derive(Debug, Default)]
pub struct ReportBuilder {
    report_id: Option<ReportId>,
    topic: Option<Topic>,
    body_location: Option<String>,
    item_count: Option<i32>,
    created_at: Option<DateTime<Utc>>,
    pipeline_step: Option<PipelineStep>,
    sending_org: Option<String>,
    sending_org_client: Option<String>,
    receiving_org: Option<String>,
    receiving_org_svc: Option<String>,
}

impl ReportBuilder {
    /// Creates a new ReportBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the report ID (a random one is generated otherwise)
    pub fn report_id(mut self, report_id: ReportId) -> Self {
        self.report_id = Some(report_id);
        self
    }

    /// Sets the topic
    pub fn topic(mut self, topic: Topic) -> Self {
        self.topic = Some(topic);
        self
    }

    /// Sets the body location
    pub fn body_location(mut self, location: impl Into<String>) -> Self {
        self.body_location = Some(location.into());
        self
    }

    /// Sets the item count (defaults to 1)
    pub fn item_count(mut self, count: i32) -> Self {
        self.item_count = Some(count);
        self
    }

    /// Sets the creation time (defaults to now)
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the producing pipeline step
    pub fn pipeline_step(mut self, step: PipelineStep) -> Self {
        self.pipeline_step = Some(step);
        self
    }

    /// Sets the sending organization and client
    pub fn sender(mut self, org: impl Into<String>, client: impl Into<String>) -> Self {
        self.sending_org = Some(org.into());
        self.sending_org_client = Some(client.into());
        self
    }

    /// Sets the receiving organization and service
    pub fn receiver(mut self, org: impl Into<String>, svc: impl Into<String>) -> Self {
        self.receiving_org = Some(org.into());
        self.receiving_org_svc = Some(svc.into());
        self
    }

    /// Builds the Report
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or the item count is negative
    pub fn build(self) -> Result<Report, String> {
        let item_count = self.item_count.unwrap_or(1);
        if item_count < 0 {
            return Err(format!("item_count cannot be negative, got {item_count}"));
        }

        Ok(Report {
            report_id: self.report_id.unwrap_or_default(),
            topic: self.topic.ok_or("topic is required")?,
            body_location: self.body_location.ok_or("body_location is required")?,
            item_count,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            pipeline_step: self.pipeline_step.ok_or("pipeline_step is required")?,
            sending_org: self.sending_org,
            sending_org_client: self.sending_org_client,
            receiving_org: self.receiving_org,
            receiving_org_svc: self.receiving_org_svc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic() -> Topic {
        Topic::new("full-elr").unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let report = Report::builder()
            .topic(topic())
            .pipeline_step(PipelineStep::Convert)
            .body_location("convert/a.fhir")
            .build()
            .unwrap();

        assert_eq!(report.item_count, 1);
        assert!(report.sending_org.is_none());
        assert!(report.sender_name().is_none());
        assert!(report.receiver_name().is_none());
    }

    #[test]
    fn test_builder_missing_fields() {
        let err = Report::builder()
            .pipeline_step(PipelineStep::Convert)
            .body_location("x")
            .build()
            .unwrap_err();
        assert_eq!(err, "topic is required");

        let err = Report::builder()
            .topic(topic())
            .body_location("x")
            .build()
            .unwrap_err();
        assert_eq!(err, "pipeline_step is required");
    }

    #[test]
    fn test_builder_rejects_negative_count() {
        let result = Report::builder()
            .topic(topic())
            .pipeline_step(PipelineStep::Route)
            .body_location("x")
            .item_count(-1)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_receiver_name() {
        let report = Report::builder()
            .topic(topic())
            .pipeline_step(PipelineStep::ReceiverFilter)
            .body_location("x")
            .receiver("me-phd", "elr")
            .item_count(0)
            .build()
            .unwrap();
        assert_eq!(report.receiver_name().as_deref(), Some("me-phd.elr"));
        assert!(report.is_empty());
    }
}

//! Receiver filter step
//!
//! Evaluates one receiver's filters against one item of the input report.
//! A passing item becomes a single-item report addressed to the receiver;
//! a failing item ends in an empty report so its lineage still records
//! where it stopped.

use super::execution::StepExecution;
use crate::adapters::database::{LineageStore, StepOutput};
use crate::core::events::{Delivery, EventProperty, EventService, ReportStreamEventName};
use crate::core::filter::{EvaluationMode, FilterEngine, FilterFailure};
use crate::domain::{
    Bundle, CourierError, ItemLineage, ItemRef, PipelineStep, Receiver, Report, ReportId, Result,
};
use serde_json::Value;
use std::sync::Arc;

/// Result of filtering one item for one receiver
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverFilterResult {
    /// The report written by the step
    pub report: Report,

    /// Failures; empty when the item was routed
    pub failures: Vec<FilterFailure>,
}

impl ReceiverFilterResult {
    pub fn is_routed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The receiver filter pipeline step
#[derive(Clone)]
pub struct ReceiverFilterStep {
    engine: FilterEngine,
    store: Arc<dyn LineageStore + Send + Sync>,
    events: EventService,
}

impl ReceiverFilterStep {
    pub fn new(
        engine: FilterEngine,
        store: Arc<dyn LineageStore + Send + Sync>,
        events: EventService,
    ) -> Self {
        Self {
            engine,
            store,
            events,
        }
    }

    /// Filters item `item_index` of `input` for `receiver`
    ///
    /// The bundle is assigned an identifier in place if it has none. A routed
    /// bundle loses the observations its condition filter did not keep before
    /// its item hash is taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the output report cannot be built or persisted,
    /// or if the receiver configures both condition filter kinds. Filter
    /// failures are part of the result, not errors.
    pub async fn run(
        &self,
        input: &Report,
        item_index: i32,
        bundle: &mut Bundle,
        receiver: &Receiver,
    ) -> Result<ReceiverFilterResult> {
        let failures =
            self.engine
                .evaluate_receiver_filters(receiver, bundle, EvaluationMode::Collecting)?;
        let routed = failures.is_empty();
        let tracking_id = bundle.ensure_identifier();
        let digest = bundle.digest()?;

        let report_id = ReportId::new();
        let report = Report::builder()
            .report_id(report_id)
            .topic(input.topic.clone())
            .body_location(format!(
                "{}/{}/{}.fhir",
                PipelineStep::ReceiverFilter,
                receiver.full_name(),
                report_id
            ))
            .item_count(if routed { 1 } else { 0 })
            .pipeline_step(PipelineStep::ReceiverFilter)
            .receiver(receiver.organization.clone(), receiver.name.clone())
            .build()
            .map_err(CourierError::Validation)?;

        let mut output = StepOutput::derived(report.clone(), vec![input.report_id]);
        if routed {
            output = output.with_items(vec![ItemLineage::new(
                ItemRef::new(input.report_id, item_index),
                ItemRef::new(report_id, 1),
            )
            .with_tracking_id(tracking_id.clone())
            .with_item_hash(digest.clone())]);
        }

        let mut execution = StepExecution::new();
        execution.add_output(output);

        let receiver_name = receiver.full_name();
        if routed {
            self.events
                .send_item_event(
                    ReportStreamEventName::ItemRouted,
                    &report,
                    Delivery::Queued(execution.events_mut()),
                    |b| {
                        b.parent_report_id(input.report_id)
                            .parent_item_index(item_index)
                            .child_item_index(1)
                            .tracking_id(tracking_id.clone())
                            .param(EventProperty::ReceiverName, receiver_name.clone());
                    },
                )
                .await;
        } else {
            let failing: Vec<Value> = failures
                .iter()
                .map(|f| Value::String(f.message.clone()))
                .collect();
            let filter_type = failures
                .first()
                .map(|f| f.filter_type.as_str())
                .unwrap_or_default();
            self.events
                .send_item_event(
                    ReportStreamEventName::ItemFilterFailed,
                    &report,
                    Delivery::Queued(execution.events_mut()),
                    |b| {
                        b.parent_report_id(input.report_id)
                            .parent_item_index(item_index)
                            .tracking_id(tracking_id.clone())
                            .param(EventProperty::FailingFilters, Value::Array(failing))
                            .param(EventProperty::FilterType, filter_type)
                            .param(EventProperty::ReceiverName, receiver_name.clone())
                            .param(EventProperty::BundleDigest, digest.clone());
                    },
                )
                .await;
        }

        execution.commit(self.store.as_ref(), &self.events).await?;

        tracing::info!(
            input = %input.report_id,
            output = %report_id,
            receiver = %receiver_name,
            routed,
            failures = failures.len(),
            "Receiver filter step completed"
        );

        Ok(ReceiverFilterResult { report, failures })
    }
}

impl std::fmt::Debug for ReceiverFilterStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiverFilterStep")
            .field("engine", &self.engine)
            .field("store", &self.store.backend_name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fhir::PathExpressionEvaluator;
    use crate::adapters::memory::InMemoryLineageStore;
    use crate::core::lineage::ReportGraph;
    use crate::domain::{CustomerStatus, FilterExpressions, Topic};
    use crate::logging::MemoryTelemetrySink;
    use serde_json::json;

    struct Fixture {
        step: ReceiverFilterStep,
        store: Arc<InMemoryLineageStore>,
        sink: Arc<MemoryTelemetrySink>,
        input: Report,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryLineageStore::new());
        let sink = Arc::new(MemoryTelemetrySink::new());
        let events = EventService::new(ReportGraph::new(store.clone()), sink.clone());
        let engine = FilterEngine::new(Arc::new(PathExpressionEvaluator::new()));

        let input = Report::builder()
            .topic(Topic::new("full-elr").unwrap())
            .body_location("receive/input.fhir")
            .item_count(2)
            .pipeline_step(PipelineStep::Receive)
            .sender("simple_report", "default")
            .build()
            .unwrap();
        store
            .persist_step(&[StepOutput::root(input.clone())])
            .await
            .unwrap();

        Fixture {
            step: ReceiverFilterStep::new(engine, store.clone(), events),
            store,
            sink,
            input,
        }
    }

    fn receiver() -> Receiver {
        Receiver {
            organization: "me-phd".to_string(),
            name: "elr".to_string(),
            topic: Topic::new("full-elr").unwrap(),
            customer_status: CustomerStatus::Active,
            filters: FilterExpressions {
                jurisdictional_filter: vec!["state = 'ME'".to_string()],
                quality_filter: vec!["birthDate.exists()".to_string()],
                ..Default::default()
            },
            reverse_the_quality_filter: false,
        }
    }

    #[tokio::test]
    async fn test_routed_item() {
        let f = fixture().await;
        let mut bundle = Bundle::new(json!({
            "resourceType": "Bundle",
            "identifier": {"value": "msg-7"},
            "state": "ME",
            "birthDate": "1990-01-01"
        }))
        .unwrap();

        let result = f.step.run(&f.input, 2, &mut bundle, &receiver()).await.unwrap();
        assert!(result.is_routed());
        assert_eq!(result.report.item_count, 1);
        assert_eq!(result.report.receiver_name().as_deref(), Some("me-phd.elr"));

        let events = f.sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "ITEM_ROUTED");
        assert_eq!(events[0].properties["trackingId"], json!("msg-7"));
        assert_eq!(events[0].properties["submittedItemIndex"], json!(2));
        assert_eq!(events[0].properties["sender"], json!("simple_report.default"));
        assert_eq!(
            events[0].properties["submittedReportIds"],
            json!([f.input.report_id.to_string()])
        );
        assert_eq!(f.store.report_count().await, 2);
    }

    #[tokio::test]
    async fn test_filtered_item() {
        let f = fixture().await;
        let mut bundle = Bundle::new(json!({"resourceType": "Bundle", "state": "TX"})).unwrap();

        let result = f.step.run(&f.input, 1, &mut bundle, &receiver()).await.unwrap();
        assert!(!result.is_routed());
        assert_eq!(result.failures.len(), 2);
        assert!(result.report.is_empty());

        let events = f.sink.events();
        assert_eq!(events[0].name, "ITEM_FILTER_FAILED");
        assert_eq!(events[0].properties["filterType"], json!("JURISDICTIONAL_FILTER"));
        assert_eq!(events[0].properties["receiverName"], json!("me-phd.elr"));
        assert_eq!(
            events[0].properties["failingFilters"].as_array().map(Vec::len),
            Some(2)
        );
        assert_eq!(events[0].properties["bundleDigest"], json!(bundle.digest().unwrap()));
    }

    #[tokio::test]
    async fn test_routed_item_keeps_matching_observations() {
        let f = fixture().await;
        let mut r = receiver();
        r.filters
            .condition_filter
            .push("%resource.code.coding.code = '94558-4'".to_string());
        let observation = |code: &str| {
            json!({"resource": {"resourceType": "Observation", "code": {"coding": [{"code": code}]}}})
        };
        let mut bundle = Bundle::new(json!({
            "resourceType": "Bundle",
            "identifier": {"value": "msg-9"},
            "state": "ME",
            "birthDate": "1990-01-01",
            "entry": [observation("1234-5"), observation("94558-4")]
        }))
        .unwrap();

        let result = f.step.run(&f.input, 1, &mut bundle, &r).await.unwrap();
        assert!(result.is_routed());
        assert_eq!(bundle.observation_count(), 1);

        let parents = f
            .store
            .item_parents(ItemRef::new(result.report.report_id, 1))
            .await
            .unwrap();
        assert_eq!(parents, vec![ItemRef::new(f.input.report_id, 1)]);
    }
}

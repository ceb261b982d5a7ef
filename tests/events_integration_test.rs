//! Integration tests for business events raised by pipeline steps

use courier::adapters::database::{LineageStore, StepOutput};
use courier::adapters::fhir::PathExpressionEvaluator;
use courier::adapters::memory::InMemoryLineageStore;
use courier::core::events::{Delivery, EventProperty, EventService, ReportStreamEventName};
use courier::core::filter::FilterEngine;
use courier::core::lineage::ReportGraph;
use courier::core::pipeline::{ReceiverFilterStep, StepExecution};
use courier::domain::{
    Bundle, CustomerStatus, FilterExpressions, PipelineStep, Receiver, Report, ReportId, Topic,
};
use courier::logging::MemoryTelemetrySink;
use serde_json::json;
use std::sync::Arc;

struct Harness {
    store: Arc<InMemoryLineageStore>,
    sink: Arc<MemoryTelemetrySink>,
    events: EventService,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(InMemoryLineageStore::new());
        let sink = Arc::new(MemoryTelemetrySink::new());
        let events = EventService::new(ReportGraph::new(store.clone()), sink.clone());
        Self {
            store,
            sink,
            events,
        }
    }

    fn receiver_filter_step(&self) -> ReceiverFilterStep {
        let engine = FilterEngine::new(Arc::new(PathExpressionEvaluator::new()));
        ReceiverFilterStep::new(engine, self.store.clone(), self.events.clone())
    }

    async fn submit(&self, items: i32) -> Report {
        let report = Report::builder()
            .topic(Topic::new("full-elr").unwrap())
            .body_location("receive/upload.fhir")
            .item_count(items)
            .pipeline_step(PipelineStep::Receive)
            .sender("simple_report", "default")
            .build()
            .unwrap();

        let mut execution = StepExecution::new();
        execution.add_output(StepOutput::root(report.clone()));
        self.events
            .send_report_event(
                ReportStreamEventName::ReportReceived,
                &report,
                Delivery::Queued(execution.events_mut()),
                |b| {
                    b.param(EventProperty::SenderName, "simple_report.default");
                },
            )
            .await;
        execution
            .commit(self.store.as_ref(), &self.events)
            .await
            .unwrap();
        report
    }
}

fn receiver(org: &str, state: &str) -> Receiver {
    Receiver {
        organization: org.to_string(),
        name: "elr".to_string(),
        topic: Topic::new("full-elr").unwrap(),
        customer_status: CustomerStatus::Active,
        filters: FilterExpressions {
            jurisdictional_filter: vec![format!("state = '{state}'")],
            ..Default::default()
        },
        reverse_the_quality_filter: false,
    }
}

fn item(state: &str) -> Bundle {
    Bundle::new(json!({"resourceType": "Bundle", "state": state})).unwrap()
}

#[tokio::test]
async fn test_receiver_filter_run_emits_one_event_per_item_and_receiver() {
    let harness = Harness::new();
    let submitted = harness.submit(2).await;
    let step = harness.receiver_filter_step();
    let receivers = [receiver("me-phd", "ME"), receiver("nh-phd", "NH")];

    for (index, state) in [(1, "ME"), (2, "NH")] {
        let mut bundle = item(state);
        for receiver in &receivers {
            step.run(&submitted, index, &mut bundle, receiver)
                .await
                .unwrap();
        }
    }

    assert_eq!(
        harness.sink.event_names(),
        vec![
            "REPORT_RECEIVED",
            "ITEM_ROUTED",
            "ITEM_FILTER_FAILED",
            "ITEM_FILTER_FAILED",
            "ITEM_ROUTED",
        ]
    );

    let events = harness.sink.events();
    let submitted_id = json!([submitted.report_id.to_string()]);
    for event in &events[1..] {
        assert_eq!(event.properties["submittedReportIds"], submitted_id);
        assert_eq!(event.properties["sender"], json!("simple_report.default"));
    }
    assert_eq!(events[1].properties["receiverName"], json!("me-phd.elr"));
    assert_eq!(events[1].properties["submittedItemIndex"], json!(1));
    assert_eq!(events[4].properties["receiverName"], json!("nh-phd.elr"));
    assert_eq!(events[4].properties["submittedItemIndex"], json!(2));

    // the bundle identifier assigned on first evaluation is reused
    assert_eq!(events[3].properties["trackingId"], events[4].properties["trackingId"]);

    let graph = harness.events.graph();
    let outputs = graph
        .descendant_walk(&[submitted.report_id], Some(PipelineStep::ReceiverFilter))
        .await
        .unwrap();
    assert_eq!(outputs.len(), 4);
}

#[tokio::test]
async fn test_events_wait_for_commit() {
    let harness = Harness::new();
    let submitted = harness.submit(1).await;
    let child = Report::builder()
        .topic(Topic::new("full-elr").unwrap())
        .body_location("convert/out.fhir")
        .pipeline_step(PipelineStep::Convert)
        .build()
        .unwrap();

    let mut execution = StepExecution::new();
    execution.add_output(StepOutput::derived(child.clone(), vec![submitted.report_id]));
    harness
        .events
        .send_report_event(
            ReportStreamEventName::ReportAccepted,
            &child,
            Delivery::Queued(execution.events_mut()),
            |b| {
                b.parent_report_id(submitted.report_id);
            },
        )
        .await;

    assert_eq!(harness.sink.len(), 1);
    assert_eq!(execution.pending_event_count(), 1);

    execution
        .commit(harness.store.as_ref(), &harness.events)
        .await
        .unwrap();
    assert_eq!(
        harness.sink.event_names(),
        vec!["REPORT_RECEIVED", "REPORT_ACCEPTED"]
    );
}

#[tokio::test]
async fn test_failed_commit_sends_nothing() {
    let harness = Harness::new();
    let orphan = Report::builder()
        .topic(Topic::new("full-elr").unwrap())
        .body_location("convert/orphan.fhir")
        .pipeline_step(PipelineStep::Convert)
        .build()
        .unwrap();

    let mut execution = StepExecution::new();
    execution.add_output(StepOutput::derived(orphan.clone(), vec![ReportId::new()]));
    harness
        .events
        .send_report_event(
            ReportStreamEventName::ReportAccepted,
            &orphan,
            Delivery::Queued(execution.events_mut()),
            |_| {},
        )
        .await;

    assert!(execution
        .commit(harness.store.as_ref(), &harness.events)
        .await
        .is_err());
    assert!(harness.sink.is_empty());
    assert_eq!(harness.store.report_count().await, 0);
}

#[tokio::test]
async fn test_processing_errors_are_sent_immediately() {
    let harness = Harness::new();
    let submitted = harness.submit(1).await;

    harness
        .events
        .send_report_processing_error(
            ReportStreamEventName::ReportProcessingError,
            &submitted,
            "translation failed",
            Delivery::Immediate,
            |_| {},
        )
        .await;
    harness
        .events
        .send_submission_processing_error(
            ReportId::new(),
            "receive/broken.fhir",
            "payload is not a bundle",
            Delivery::Immediate,
            |b| {
                b.param(EventProperty::FileLength, 12);
            },
        )
        .await;

    let events = harness.sink.events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[1].properties["processingError"], json!("translation failed"));
    // a submitted report with no parent resolves to no submitted ids
    assert_eq!(events[1].properties["submittedReportIds"], json!([]));
    assert_eq!(events[2].name, "SUBMISSION_PROCESSING_ERROR");
    assert_eq!(events[2].properties["fileLength"], json!(12));
    assert_eq!(events[2].properties["topic"], json!(null));
}

#[tokio::test]
async fn test_failing_sink_does_not_fail_the_step() {
    let store = Arc::new(InMemoryLineageStore::new());
    let sink = Arc::new(MemoryTelemetrySink::failing("ingestion unavailable"));
    let events = EventService::new(ReportGraph::new(store.clone()), sink.clone());
    let step = ReceiverFilterStep::new(
        FilterEngine::new(Arc::new(PathExpressionEvaluator::new())),
        store.clone(),
        events,
    );

    let submitted = Report::builder()
        .topic(Topic::new("full-elr").unwrap())
        .body_location("receive/upload.fhir")
        .pipeline_step(PipelineStep::Receive)
        .build()
        .unwrap();
    store
        .persist_step(&[StepOutput::root(submitted.clone())])
        .await
        .unwrap();

    let result = step
        .run(&submitted, 1, &mut item("ME"), &receiver("me-phd", "ME"))
        .await
        .unwrap();
    assert!(result.is_routed());
    assert!(sink.is_empty());
    assert_eq!(store.report_count().await, 2);
}

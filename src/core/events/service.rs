//! Event dispatch
//!
//! Events are either sent as soon as they are raised or queued on the
//! [`PendingEvents`] of the running step and flushed after its lineage write
//! commits. Dispatch is best-effort: sink failures are logged, never returned.

use super::builder::{EventBuilder, EventSpec};
use super::model::ReportStreamEventName;
use crate::core::lineage::ReportGraph;
use crate::domain::{Report, ReportId};
use crate::logging::TelemetrySink;
use crate::{log_error_with_context, log_event_dispatched};
use std::sync::Arc;

/// Builders waiting for their step to commit, in enqueue order
#[derive(Debug, Default)]
pub struct PendingEvents {
    builders: Vec<EventBuilder>,
}

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, builder: EventBuilder) {
        self.builders.push(builder);
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Names of the queued events, in order
    pub fn names(&self) -> Vec<ReportStreamEventName> {
        self.builders.iter().map(EventBuilder::name).collect()
    }

    /// Drops every queued builder, returning how many were dropped
    pub fn discard(&mut self) -> usize {
        let dropped = self.builders.len();
        self.builders.clear();
        dropped
    }

    fn take(&mut self) -> Vec<EventBuilder> {
        std::mem::take(&mut self.builders)
    }
}

/// How an event is delivered
#[derive(Debug)]
pub enum Delivery<'a> {
    /// Build and send now
    Immediate,
    /// Queue until [`EventService::flush_queued_events`]
    Queued(&'a mut PendingEvents),
}

/// Builds business events and hands them to the telemetry sink
#[derive(Clone)]
pub struct EventService {
    graph: ReportGraph,
    sink: Arc<dyn TelemetrySink + Send + Sync>,
}

impl EventService {
    pub fn new(graph: ReportGraph, sink: Arc<dyn TelemetrySink + Send + Sync>) -> Self {
        Self { graph, sink }
    }

    pub fn graph(&self) -> &ReportGraph {
        &self.graph
    }

    /// Report-scoped event for `report`
    pub async fn send_report_event(
        &self,
        name: ReportStreamEventName,
        report: &Report,
        delivery: Delivery<'_>,
        configure: impl FnOnce(&mut EventBuilder),
    ) {
        let builder = EventBuilder::new(EventSpec::for_report(name, report));
        self.deliver(builder, delivery, configure).await;
    }

    /// Item-scoped event for `report`; `configure` must set a parent report
    pub async fn send_item_event(
        &self,
        name: ReportStreamEventName,
        report: &Report,
        delivery: Delivery<'_>,
        configure: impl FnOnce(&mut EventBuilder),
    ) {
        let builder = EventBuilder::new(EventSpec::for_item(name, report));
        self.deliver(builder, delivery, configure).await;
    }

    /// Report-scoped event carrying a `processingError` property
    pub async fn send_report_processing_error(
        &self,
        name: ReportStreamEventName,
        report: &Report,
        error: impl Into<String>,
        delivery: Delivery<'_>,
        configure: impl FnOnce(&mut EventBuilder),
    ) {
        let mut builder = EventBuilder::new(EventSpec::for_report(name, report));
        builder.processing_error(error);
        self.deliver(builder, delivery, configure).await;
    }

    /// Item-scoped event carrying a `processingError` property
    pub async fn send_item_processing_error(
        &self,
        name: ReportStreamEventName,
        report: &Report,
        error: impl Into<String>,
        delivery: Delivery<'_>,
        configure: impl FnOnce(&mut EventBuilder),
    ) {
        let mut builder = EventBuilder::new(EventSpec::for_item(name, report));
        builder.processing_error(error);
        self.deliver(builder, delivery, configure).await;
    }

    /// Error for a submission that failed before any report row was written
    pub async fn send_submission_processing_error(
        &self,
        submission_id: ReportId,
        blob_url: impl Into<String>,
        error: impl Into<String>,
        delivery: Delivery<'_>,
        configure: impl FnOnce(&mut EventBuilder),
    ) {
        let mut builder = EventBuilder::new(EventSpec::for_submission(
            ReportStreamEventName::SubmissionProcessingError,
            submission_id,
            blob_url,
        ));
        builder.processing_error(error);
        self.deliver(builder, delivery, configure).await;
    }

    /// Sends every queued event in enqueue order and empties the queue
    ///
    /// Call only after the lineage write of the step has committed.
    pub async fn flush_queued_events(&self, pending: &mut PendingEvents) {
        let builders = pending.take();
        if builders.is_empty() {
            return;
        }

        tracing::debug!(count = builders.len(), "Flushing queued events");
        for builder in builders {
            self.dispatch(builder).await;
        }
    }

    async fn deliver(
        &self,
        mut builder: EventBuilder,
        delivery: Delivery<'_>,
        configure: impl FnOnce(&mut EventBuilder),
    ) {
        configure(&mut builder);
        match delivery {
            Delivery::Immediate => self.dispatch(builder).await,
            Delivery::Queued(pending) => {
                tracing::trace!(event = %builder.name(), queued = pending.len() + 1, "Queued event");
                pending.push(builder);
            }
        }
    }

    async fn dispatch(&self, builder: EventBuilder) {
        let name = builder.name();
        let event = match builder.build(&self.graph).await {
            Ok(event) => event,
            Err(e) => {
                log_error_with_context!(&e, "Failed to build business event");
                return;
            }
        };

        if let Err(e) = self
            .sink
            .track_event(name.as_str(), &event.to_properties())
            .await
        {
            tracing::warn!(
                event = %name,
                sink = self.sink.sink_name(),
                error = %e,
                "Failed to deliver event to telemetry sink"
            );
        }

        let event_json = serde_json::to_string(&event).unwrap_or_default();
        log_event_dispatched!(name, event_json);
    }
}

impl std::fmt::Debug for EventService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventService")
            .field("graph", &self.graph)
            .field("sink", &self.sink.sink_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryLineageStore;
    use crate::core::events::EventProperty;
    use crate::domain::{PipelineStep, Topic};
    use crate::logging::MemoryTelemetrySink;
    use serde_json::json;

    fn service(sink: Arc<MemoryTelemetrySink>) -> EventService {
        let graph = ReportGraph::new(Arc::new(InMemoryLineageStore::new()));
        EventService::new(graph, sink)
    }

    fn report() -> Report {
        Report::builder()
            .topic(Topic::new("full-elr").unwrap())
            .body_location("blob://x")
            .pipeline_step(PipelineStep::Route)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_immediate_event_reaches_sink() {
        let sink = Arc::new(MemoryTelemetrySink::new());
        let report = report();
        service(sink.clone())
            .send_report_event(
                ReportStreamEventName::ReportReceived,
                &report,
                Delivery::Immediate,
                |b| {
                    b.param(EventProperty::SenderName, "simple_report");
                },
            )
            .await;

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "REPORT_RECEIVED");
        assert_eq!(events[0].properties["senderName"], json!("simple_report"));
    }

    #[tokio::test]
    async fn test_queued_events_flush_in_order() {
        let sink = Arc::new(MemoryTelemetrySink::new());
        let service = service(sink.clone());
        let report = report();
        let mut pending = PendingEvents::new();

        for name in [
            ReportStreamEventName::ReportReceived,
            ReportStreamEventName::ReportRouted,
            ReportStreamEventName::ReportSent,
        ] {
            service
                .send_report_event(name, &report, Delivery::Queued(&mut pending), |_| {})
                .await;
        }
        assert!(sink.is_empty());
        assert_eq!(pending.len(), 3);

        service.flush_queued_events(&mut pending).await;
        assert_eq!(
            sink.event_names(),
            vec!["REPORT_RECEIVED", "REPORT_ROUTED", "REPORT_SENT"]
        );
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let sink = Arc::new(MemoryTelemetrySink::failing("down"));
        service(sink.clone())
            .send_report_processing_error(
                ReportStreamEventName::ReportProcessingError,
                &report(),
                "translation failed",
                Delivery::Immediate,
                |_| {},
            )
            .await;
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_item_error_carries_processing_error() {
        let sink = Arc::new(MemoryTelemetrySink::new());
        let parent = ReportId::new();
        service(sink.clone())
            .send_item_processing_error(
                ReportStreamEventName::ItemProcessingError,
                &report(),
                "bad coding",
                Delivery::Immediate,
                |b| {
                    b.parent_report_id(parent).parent_item_index(2);
                },
            )
            .await;

        let events = sink.events();
        assert_eq!(events[0].properties["processingError"], json!("bad coding"));
        assert_eq!(events[0].properties["parentItemIndex"], json!(2));
        assert_eq!(
            events[0].properties["submittedReportIds"],
            json!([parent.to_string()])
        );
    }

    #[tokio::test]
    async fn test_submission_error_has_no_topic() {
        let sink = Arc::new(MemoryTelemetrySink::new());
        service(sink.clone())
            .send_submission_processing_error(
                ReportId::new(),
                "receive/upload.fhir",
                "unreadable payload",
                Delivery::Immediate,
                |_| {},
            )
            .await;

        let events = sink.events();
        assert_eq!(events[0].name, "SUBMISSION_PROCESSING_ERROR");
        assert_eq!(events[0].properties["topic"], json!(null));
        assert_eq!(events[0].properties["pipelineStepName"], json!("receive"));
    }

    #[tokio::test]
    async fn test_item_event_without_parent_is_dropped() {
        let sink = Arc::new(MemoryTelemetrySink::new());
        service(sink.clone())
            .send_item_event(
                ReportStreamEventName::ItemRouted,
                &report(),
                Delivery::Immediate,
                |_| {},
            )
            .await;
        assert!(sink.is_empty());
    }
}

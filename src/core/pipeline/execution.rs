//! Unit of work for one pipeline-step run

use crate::adapters::database::{LineageStore, StepOutput};
use crate::core::events::{EventService, PendingEvents};
use crate::domain::{ReportId, Result};
use crate::log_error_with_context;

/// Reports, lineage and queued events produced by one step run
///
/// Nothing leaves the unit of work until [`commit`](Self::commit): the
/// outputs are persisted in one transaction, then the queued events are
/// flushed in the order they were raised.
#[derive(Debug, Default)]
pub struct StepExecution {
    outputs: Vec<StepOutput>,
    events: PendingEvents,
}

impl StepExecution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_output(&mut self, output: StepOutput) -> ReportId {
        let id = output.report_id();
        self.outputs.push(output);
        id
    }

    pub fn outputs(&self) -> &[StepOutput] {
        &self.outputs
    }

    /// Queue for events raised during this run
    pub fn events_mut(&mut self) -> &mut PendingEvents {
        &mut self.events
    }

    pub fn pending_event_count(&self) -> usize {
        self.events.len()
    }

    /// Persists the outputs, then flushes the queued events
    ///
    /// # Errors
    ///
    /// Returns the store error if the write fails. Nothing is persisted and
    /// the queued events are discarded.
    pub async fn commit(
        mut self,
        store: &dyn LineageStore,
        events: &EventService,
    ) -> Result<Vec<ReportId>> {
        let ids: Vec<ReportId> = self.outputs.iter().map(StepOutput::report_id).collect();

        if let Err(e) = store.persist_step(&self.outputs).await {
            let dropped = self.events.discard();
            log_error_with_context!(&e, "Step outputs were not persisted");
            tracing::warn!(dropped, "Discarded queued events of the failed step");
            return Err(e);
        }

        tracing::debug!(
            reports = ids.len(),
            events = self.events.len(),
            backend = store.backend_name(),
            "Committed step outputs"
        );
        events.flush_queued_events(&mut self.events).await;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryLineageStore;
    use crate::core::events::{Delivery, ReportStreamEventName};
    use crate::core::lineage::ReportGraph;
    use crate::domain::{CourierError, LineageError, PipelineStep, Report, Topic};
    use crate::logging::MemoryTelemetrySink;
    use std::sync::Arc;

    fn report(step: PipelineStep) -> Report {
        Report::builder()
            .topic(Topic::new("full-elr").unwrap())
            .body_location("blob://x")
            .pipeline_step(step)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_persists_then_flushes() {
        let store = Arc::new(InMemoryLineageStore::new());
        let sink = Arc::new(MemoryTelemetrySink::new());
        let events = EventService::new(ReportGraph::new(store.clone()), sink.clone());

        let received = report(PipelineStep::Receive);
        let mut execution = StepExecution::new();
        execution.add_output(StepOutput::root(received.clone()));
        events
            .send_report_event(
                ReportStreamEventName::ReportReceived,
                &received,
                Delivery::Queued(execution.events_mut()),
                |_| {},
            )
            .await;
        assert!(sink.is_empty());

        let ids = execution.commit(store.as_ref(), &events).await.unwrap();
        assert_eq!(ids, vec![received.report_id]);
        assert_eq!(store.report_count().await, 1);
        assert_eq!(sink.event_names(), vec!["REPORT_RECEIVED"]);
    }

    #[tokio::test]
    async fn test_failed_commit_discards_events() {
        let store = Arc::new(InMemoryLineageStore::new());
        let sink = Arc::new(MemoryTelemetrySink::new());
        let events = EventService::new(ReportGraph::new(store.clone()), sink.clone());

        let orphan = report(PipelineStep::Route);
        let mut execution = StepExecution::new();
        execution.add_output(StepOutput::derived(orphan.clone(), vec![ReportId::new()]));
        events
            .send_report_event(
                ReportStreamEventName::ReportRouted,
                &orphan,
                Delivery::Queued(execution.events_mut()),
                |_| {},
            )
            .await;

        let err = execution.commit(store.as_ref(), &events).await.unwrap_err();
        assert!(matches!(
            err,
            CourierError::Lineage(LineageError::MissingParent { .. })
        ));
        assert!(sink.is_empty());
        assert_eq!(store.report_count().await, 0);
    }
}

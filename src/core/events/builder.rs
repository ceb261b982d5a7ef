//! Event builders
//!
//! An [`EventBuilder`] holds an [`EventSpec`]: the facts known where the
//! event is raised. Lineage (submitted reports, submitted item index, sender)
//! is resolved only when the builder is built, so a queued builder sees every
//! edge committed before it is flushed.

use super::model::{
    BusinessEvent, EventProperty, ItemEventData, ReportEventData, ReportStreamEventName,
};
use crate::core::lineage::ReportGraph;
use crate::domain::{Bundle, CourierError, PipelineStep, Report, ReportId, Result, Topic};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Item position supplied by the caller, 1-based
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSpec {
    pub child_index: i32,
    pub parent_index: i32,
    pub tracking_id: Option<String>,
}

impl Default for ItemSpec {
    fn default() -> Self {
        Self {
            child_index: 1,
            parent_index: 1,
            tracking_id: None,
        }
    }
}

/// Everything known about an event before lineage is resolved
#[derive(Debug, Clone, PartialEq)]
pub struct EventSpec {
    pub name: ReportStreamEventName,
    pub child_report_id: ReportId,
    pub pipeline_step: PipelineStep,
    pub topic: Option<Topic>,
    pub blob_url: String,
    pub parent_report_id: Option<ReportId>,
    pub params: BTreeMap<EventProperty, Value>,
    pub item: Option<ItemSpec>,
    pub processing_error: Option<String>,
}

impl EventSpec {
    /// Report-scoped spec for `report`
    pub fn for_report(name: ReportStreamEventName, report: &Report) -> Self {
        Self {
            name,
            child_report_id: report.report_id,
            pipeline_step: report.pipeline_step,
            topic: Some(report.topic.clone()),
            blob_url: report.body_location.clone(),
            parent_report_id: None,
            params: BTreeMap::new(),
            item: None,
            processing_error: None,
        }
    }

    /// Item-scoped spec for `report`
    pub fn for_item(name: ReportStreamEventName, report: &Report) -> Self {
        Self {
            item: Some(ItemSpec::default()),
            ..Self::for_report(name, report)
        }
    }

    /// Spec for a submission that failed before a report row existed
    pub fn for_submission(
        name: ReportStreamEventName,
        submission_id: ReportId,
        blob_url: impl Into<String>,
    ) -> Self {
        Self {
            name,
            child_report_id: submission_id,
            pipeline_step: PipelineStep::Receive,
            topic: None,
            blob_url: blob_url.into(),
            parent_report_id: None,
            params: BTreeMap::new(),
            item: None,
            processing_error: None,
        }
    }
}

/// Lineage resolved for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageContext {
    pub submitted_report_ids: Vec<ReportId>,
    pub submitted_item_index: Option<i32>,
    pub sender: Option<String>,
    pub resolved_at: DateTime<Utc>,
}

impl LineageContext {
    /// Context with nothing resolved
    pub fn empty() -> Self {
        Self {
            submitted_report_ids: Vec::new(),
            submitted_item_index: None,
            sender: None,
            resolved_at: Utc::now(),
        }
    }
}

/// Combines a spec with resolved lineage
///
/// # Errors
///
/// Returns an error if an item event has no parent report.
pub fn assemble(spec: EventSpec, lineage: &LineageContext) -> Result<BusinessEvent> {
    validate(&spec)?;

    let mut params = spec.params;
    if let Some(error) = spec.processing_error {
        params.insert(EventProperty::ProcessingError, Value::String(error));
    }

    let item = spec.item.map(|item| ItemEventData {
        child_item_index: item.child_index,
        parent_item_index: item.parent_index,
        submitted_item_index: lineage.submitted_item_index.or(Some(item.parent_index)),
        tracking_id: item.tracking_id,
        sender: lineage.sender.clone(),
    });

    Ok(BusinessEvent {
        name: spec.name,
        report: ReportEventData {
            child_report_id: spec.child_report_id,
            parent_report_id: spec.parent_report_id,
            submitted_report_ids: lineage.submitted_report_ids.clone(),
            topic: spec.topic,
            blob_url: spec.blob_url,
            pipeline_step_name: spec.pipeline_step,
            timestamp: lineage.resolved_at,
        },
        item,
        params,
    })
}

fn validate(spec: &EventSpec) -> Result<()> {
    if spec.item.is_some() && spec.parent_report_id.is_none() {
        return Err(CourierError::Validation(format!(
            "Item event {} for report {} requires a parent report id",
            spec.name, spec.child_report_id
        )));
    }
    Ok(())
}

/// Mutable wrapper over an [`EventSpec`] handed to event configuration closures
#[derive(Debug, Clone, PartialEq)]
pub struct EventBuilder {
    spec: EventSpec,
}

impl EventBuilder {
    pub fn new(spec: EventSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &EventSpec {
        &self.spec
    }

    pub fn name(&self) -> ReportStreamEventName {
        self.spec.name
    }

    pub fn parent_report_id(&mut self, parent: ReportId) -> &mut Self {
        self.spec.parent_report_id = Some(parent);
        self
    }

    pub fn param(&mut self, property: EventProperty, value: impl Into<Value>) -> &mut Self {
        self.spec.params.insert(property, value.into());
        self
    }

    pub fn params(&mut self, params: impl IntoIterator<Item = (EventProperty, Value)>) -> &mut Self {
        self.spec.params.extend(params);
        self
    }

    /// Sets the child item index; turns a report event into an item event
    pub fn child_item_index(&mut self, index: i32) -> &mut Self {
        self.spec.item.get_or_insert_with(ItemSpec::default).child_index = index;
        self
    }

    /// Sets the parent item index; turns a report event into an item event
    pub fn parent_item_index(&mut self, index: i32) -> &mut Self {
        self.spec.item.get_or_insert_with(ItemSpec::default).parent_index = index;
        self
    }

    pub fn tracking_id(&mut self, tracking_id: impl Into<String>) -> &mut Self {
        self.spec.item.get_or_insert_with(ItemSpec::default).tracking_id = Some(tracking_id.into());
        self
    }

    /// Uses the bundle identifier as tracking id, when it has one
    pub fn track_bundle(&mut self, bundle: &Bundle) -> &mut Self {
        if let Some(identifier) = bundle.identifier() {
            self.tracking_id(identifier.to_string());
        }
        self
    }

    pub fn processing_error(&mut self, error: impl Into<String>) -> &mut Self {
        self.spec.processing_error = Some(error.into());
        self
    }

    /// Resolves lineage against `graph` and assembles the event
    ///
    /// # Errors
    ///
    /// Returns an error if an item event has no parent report. Lineage
    /// lookups themselves degrade instead of failing.
    pub async fn build(self, graph: &ReportGraph) -> Result<BusinessEvent> {
        validate(&self.spec)?;
        let lineage = resolve_lineage(&self.spec, graph).await;
        assemble(self.spec, &lineage)
    }
}

async fn resolve_lineage(spec: &EventSpec, graph: &ReportGraph) -> LineageContext {
    let submitted_report_ids = graph
        .resolve_submitted_report_ids(spec.parent_report_id)
        .await;

    let (submitted_item_index, sender) = match (&spec.item, spec.parent_report_id) {
        (Some(item), Some(parent)) => {
            let index = graph.get_root_item_index(parent, item.parent_index).await;
            let sender = graph
                .get_reports(&submitted_report_ids)
                .await
                .iter()
                .find_map(Report::sender_name);
            (index, sender)
        }
        _ => (None, None),
    };

    LineageContext {
        submitted_report_ids,
        submitted_item_index,
        sender,
        resolved_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::{LineageStore, StepOutput};
    use crate::adapters::memory::InMemoryLineageStore;
    use crate::domain::{ItemLineage, ItemRef};
    use serde_json::json;
    use std::sync::Arc;

    fn report(step: PipelineStep) -> Report {
        Report::builder()
            .topic(Topic::new("full-elr").unwrap())
            .body_location("blob://x")
            .pipeline_step(step)
            .build()
            .unwrap()
    }

    #[test]
    fn test_assemble_report_event() {
        let child = report(PipelineStep::Route);
        let parent = ReportId::new();
        let mut spec = EventSpec::for_report(ReportStreamEventName::ReportRouted, &child);
        spec.parent_report_id = Some(parent);
        let lineage = LineageContext {
            submitted_report_ids: vec![parent],
            ..LineageContext::empty()
        };

        let event = assemble(spec, &lineage).unwrap();
        assert_eq!(event.report.child_report_id, child.report_id);
        assert_eq!(event.report.submitted_report_ids, vec![parent]);
        assert!(event.item.is_none());
    }

    #[test]
    fn test_assemble_adds_processing_error() {
        let child = report(PipelineStep::Translate);
        let mut spec = EventSpec::for_report(ReportStreamEventName::ReportProcessingError, &child);
        spec.processing_error = Some("schema not found".to_string());

        let event = assemble(spec, &LineageContext::empty()).unwrap();
        assert_eq!(
            event.param(EventProperty::ProcessingError),
            Some(&json!("schema not found"))
        );
    }

    #[test]
    fn test_item_event_requires_parent() {
        let child = report(PipelineStep::Route);
        let spec = EventSpec::for_item(ReportStreamEventName::ItemRouted, &child);
        assert!(matches!(
            assemble(spec, &LineageContext::empty()),
            Err(CourierError::Validation(_))
        ));
    }

    #[test]
    fn test_item_index_falls_back_to_parent_index() {
        let child = report(PipelineStep::Route);
        let mut builder = EventBuilder::new(EventSpec::for_item(ReportStreamEventName::ItemRouted, &child));
        builder.parent_report_id(ReportId::new()).parent_item_index(4);

        let event = assemble(builder.spec().clone(), &LineageContext::empty()).unwrap();
        assert_eq!(event.item.unwrap().submitted_item_index, Some(4));
    }

    #[tokio::test]
    async fn test_build_resolves_lineage_at_build_time() {
        let store = Arc::new(InMemoryLineageStore::new());
        let graph = ReportGraph::new(store.clone());

        let submitted = Report::builder()
            .topic(Topic::new("full-elr").unwrap())
            .body_location("blob://submitted")
            .pipeline_step(PipelineStep::Receive)
            .sender("simple_report", "default")
            .build()
            .unwrap();
        let converted = report(PipelineStep::Convert);
        let routed = report(PipelineStep::Route);

        let mut builder =
            EventBuilder::new(EventSpec::for_item(ReportStreamEventName::ItemRouted, &routed));
        builder
            .parent_report_id(converted.report_id)
            .parent_item_index(1)
            .child_item_index(1);

        // Lineage written after the builder was configured
        store.persist_step(&[StepOutput::root(submitted.clone())]).await.unwrap();
        store
            .persist_step(&[StepOutput::derived(converted.clone(), vec![submitted.report_id])
                .with_items(vec![ItemLineage::new(
                    ItemRef::new(submitted.report_id, 2),
                    ItemRef::new(converted.report_id, 1),
                )])])
            .await
            .unwrap();

        let event = builder.build(&graph).await.unwrap();
        assert_eq!(event.report.submitted_report_ids, vec![submitted.report_id]);
        let item = event.item.unwrap();
        assert_eq!(item.submitted_item_index, Some(2));
        assert_eq!(item.sender.as_deref(), Some("simple_report.default"));
    }
}

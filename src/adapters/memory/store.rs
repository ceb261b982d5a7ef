//! In-memory lineage store
//!
//! Keeps reports and lineage in process memory and answers walks with the
//! worklist closure. Used for dry runs and tests.

use crate::adapters::database::traits::{LineageStore, StepOutput};
use crate::core::lineage::closure::{walk, Reached, WalkLimits};
use crate::domain::{
    ItemGraphRow, ItemRef, LineageError, LineageNode, PipelineStep, Report, ReportId, Result,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    reports: HashMap<ReportId, Report>,
    parents: HashMap<ReportId, Vec<ReportId>>,
    children: HashMap<ReportId, Vec<ReportId>>,
    item_parents: HashMap<ItemRef, Vec<ItemRef>>,
}

impl State {
    /// Reports without a row end an ancestor walk
    fn parents_of(&self, id: &ReportId) -> Vec<ReportId> {
        if !self.reports.contains_key(id) {
            return Vec::new();
        }
        self.parents.get(id).cloned().unwrap_or_default()
    }

    fn children_of(&self, id: &ReportId) -> Vec<ReportId> {
        self.children.get(id).cloned().unwrap_or_default()
    }

    fn item_parents_of(&self, item: &ItemRef) -> Vec<ItemRef> {
        let mut parents = self.item_parents.get(item).cloned().unwrap_or_default();
        parents.sort();
        parents
    }

    fn node(&self, reached: Reached<ReportId>) -> LineageNode {
        LineageNode {
            report_id: reached.node,
            path: reached.path_label(),
            depth: reached.depth(),
            has_parent: self.parents.contains_key(&reached.node),
            known: self.reports.contains_key(&reached.node),
        }
    }
}

/// Lineage store held in process memory
#[derive(Debug, Default)]
pub struct InMemoryLineageStore {
    state: RwLock<State>,
    read_delay: Option<Duration>,
}

impl InMemoryLineageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every graph query, to exercise statement timeouts
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Record an edge without checking that its parent exists
    ///
    /// Only for reproducing corrupted lineage.
    pub async fn insert_edge_unchecked(&self, parent: ReportId, child: ReportId) {
        let mut state = self.state.write().await;
        state.parents.entry(child).or_default().push(parent);
        state.children.entry(parent).or_default().push(child);
    }

    /// Number of stored reports
    pub async fn report_count(&self) -> usize {
        self.state.read().await.reports.len()
    }

    async fn delay(&self) {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl LineageStore for InMemoryLineageStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch_report(&self, report_id: ReportId) -> Result<Option<Report>> {
        Ok(self.state.read().await.reports.get(&report_id).cloned())
    }

    async fn fetch_reports(&self, report_ids: &[ReportId]) -> Result<Vec<Report>> {
        let state = self.state.read().await;
        Ok(report_ids
            .iter()
            .filter_map(|id| state.reports.get(id).cloned())
            .collect())
    }

    async fn persist_step(&self, outputs: &[StepOutput]) -> Result<()> {
        let mut state = self.state.write().await;

        // Validate the whole batch before touching state so a failure writes nothing
        let mut visible: HashSet<ReportId> = HashSet::new();
        for output in outputs {
            for parent in &output.parents {
                if !state.reports.contains_key(parent) && !visible.contains(parent) {
                    return Err(LineageError::MissingParent {
                        parent: parent.to_string(),
                        child: output.report_id().to_string(),
                    }
                    .into());
                }
            }
            for item in &output.items {
                if item.child_report_id != output.report_id() {
                    return Err(crate::domain::CourierError::Validation(format!(
                        "Item lineage for {} attached to report {}",
                        item.child_report_id,
                        output.report_id()
                    )));
                }
                if !output.parents.contains(&item.parent_report_id) {
                    return Err(LineageError::MissingParent {
                        parent: item.parent_report_id.to_string(),
                        child: output.report_id().to_string(),
                    }
                    .into());
                }
            }
            visible.insert(output.report_id());
        }

        for output in outputs {
            let child = output.report_id();
            state.reports.insert(child, output.report.clone());
            for parent in &output.parents {
                state.parents.entry(child).or_default().push(*parent);
                state.children.entry(*parent).or_default().push(child);
            }
            for item in &output.items {
                state
                    .item_parents
                    .entry(item.child())
                    .or_default()
                    .push(item.parent());
            }
        }

        tracing::debug!(reports = outputs.len(), "Persisted step outputs in memory");
        Ok(())
    }

    async fn ancestor_walk(
        &self,
        starts: &[ReportId],
        max_depth: usize,
    ) -> Result<Vec<LineageNode>> {
        self.delay().await;
        let state = self.state.read().await;
        let reached = walk(starts, |id| state.parents_of(id), WalkLimits { max_depth })?;
        Ok(reached.into_iter().map(|r| state.node(r)).collect())
    }

    async fn descendant_walk(
        &self,
        starts: &[ReportId],
        step: Option<PipelineStep>,
        max_depth: usize,
    ) -> Result<Vec<LineageNode>> {
        self.delay().await;
        let state = self.state.read().await;
        let reached = walk(starts, |id| state.children_of(id), WalkLimits { max_depth })?;
        Ok(reached
            .into_iter()
            .filter(|r| match step {
                Some(step) => state
                    .reports
                    .get(&r.node)
                    .is_some_and(|report| report.pipeline_step == step),
                None => true,
            })
            .map(|r| state.node(r))
            .collect())
    }

    async fn item_parents(&self, item: ItemRef) -> Result<Vec<ItemRef>> {
        Ok(self.state.read().await.item_parents_of(&item))
    }

    async fn root_item(&self, item: ItemRef, max_depth: usize) -> Result<Option<ItemRef>> {
        self.delay().await;
        let state = self.state.read().await;
        let chain = walk(
            &[item],
            |current| state.item_parents_of(current).into_iter().take(1).collect(),
            WalkLimits { max_depth },
        )?;
        Ok(chain.last().map(|reached| reached.node))
    }

    async fn item_ancestor_graph(
        &self,
        terminal_report_ids: &[ReportId],
        max_depth: usize,
    ) -> Result<Vec<ItemGraphRow>> {
        self.delay().await;
        let state = self.state.read().await;
        let mut rows = Vec::new();

        for terminal in terminal_report_ids {
            let mut items: Vec<ItemRef> = state
                .item_parents
                .keys()
                .filter(|item| item.report_id == *terminal)
                .copied()
                .collect();
            items.sort();

            let reached = walk(&items, |item| state.item_parents_of(item), WalkLimits { max_depth })?;
            for r in reached {
                rows.push(ItemGraphRow {
                    starting_report_id: *terminal,
                    parent_report_id: r.node.report_id,
                    parent_index: r.node.index,
                    parent_is_root: !state.parents.contains_key(&r.node.report_id),
                    path: r.path_label(),
                });
            }
        }

        Ok(rows)
    }
}

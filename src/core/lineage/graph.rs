//! Read-side lineage queries
//!
//! [`ReportGraph`] answers provenance questions for event builders and the
//! history tooling. Apart from the raw walks, every query degrades instead of
//! failing: a store error or a statement timeout yields an empty or partial
//! answer and a warning, because these results back observability, never the
//! durable write path.

use crate::adapters::database::LineageStore;
use crate::domain::{
    ItemAncestorGraph, ItemRef, LineageError, LineageNode, PipelineStep, Report, ReportId, Result,
};
use crate::log_lineage_degraded;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on walk depth
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default per-query timeout
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Lineage graph queries over a [`LineageStore`]
#[derive(Clone)]
pub struct ReportGraph {
    store: Arc<dyn LineageStore + Send + Sync>,
    max_depth: usize,
    query_timeout: Duration,
}

impl ReportGraph {
    pub fn new(store: Arc<dyn LineageStore + Send + Sync>) -> Self {
        Self {
            store,
            max_depth: DEFAULT_MAX_DEPTH,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn LineageStore + Send + Sync> {
        &self.store
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Runs a store call under the query timeout
    async fn bounded<T>(&self, query: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.query_timeout, query).await {
            Ok(result) => result,
            Err(_) => Err(LineageError::Timeout(
                u64::try_from(self.query_timeout.as_millis()).unwrap_or(u64::MAX),
            )
            .into()),
        }
    }

    /// Every ancestor of `starts`
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails, the query times out, or a cycle
    /// is detected.
    pub async fn ancestor_walk(&self, starts: &[ReportId]) -> Result<Vec<LineageNode>> {
        self.bounded(self.store.ancestor_walk(starts, self.max_depth))
            .await
    }

    /// Every descendant of `starts`, optionally only those produced by `step`
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails, the query times out, or a cycle
    /// is detected.
    pub async fn descendant_walk(
        &self,
        starts: &[ReportId],
        step: Option<PipelineStep>,
    ) -> Result<Vec<LineageNode>> {
        self.bounded(self.store.descendant_walk(starts, step, self.max_depth))
            .await
    }

    /// Ancestors of `report_id` with no further parent
    ///
    /// Empty when the report itself has no recorded parent, or when the walk
    /// could not complete.
    pub async fn get_root_reports(&self, report_id: ReportId) -> Vec<ReportId> {
        let nodes = match self.ancestor_walk(&[report_id]).await {
            Ok(nodes) => nodes,
            Err(e) => {
                log_lineage_degraded!("get_root_reports", report_id, e);
                return Vec::new();
            }
        };

        let mut roots: Vec<ReportId> = Vec::new();
        for node in nodes.iter().filter(|node| node.is_root()) {
            if !node.known {
                tracing::warn!(
                    report_id = %node.report_id,
                    path = %node.path,
                    "Lineage references a report with no stored row; treating it as a root"
                );
            }
            if !roots.contains(&node.report_id) {
                roots.push(node.report_id);
            }
        }
        roots
    }

    /// Report rows of [`get_root_reports`](Self::get_root_reports)
    pub async fn get_root_report_rows(&self, report_id: ReportId) -> Vec<Report> {
        let roots = self.get_root_reports(report_id).await;
        self.get_reports(&roots).await
    }

    /// Stored rows for `report_ids`, in the given order; unknown ids are skipped
    pub async fn get_reports(&self, report_ids: &[ReportId]) -> Vec<Report> {
        if report_ids.is_empty() {
            return Vec::new();
        }

        match self.bounded(self.store.fetch_reports(report_ids)).await {
            Ok(reports) => report_ids
                .iter()
                .filter_map(|id| reports.iter().find(|r| r.report_id == *id).cloned())
                .collect(),
            Err(e) => {
                log_lineage_degraded!("get_reports", format!("{} reports", report_ids.len()), e);
                Vec::new()
            }
        }
    }

    /// Submitted reports for an event whose parent is `parent`
    ///
    /// A parent with no recorded ancestors is taken to be the submission
    /// itself. This heuristic does not distinguish a genuine submission from
    /// a report whose lineage could not be read.
    pub async fn resolve_submitted_report_ids(&self, parent: Option<ReportId>) -> Vec<ReportId> {
        let Some(parent) = parent else {
            return Vec::new();
        };

        let roots = self.get_root_reports(parent).await;
        if roots.is_empty() {
            vec![parent]
        } else {
            roots
        }
    }

    /// Index of the submitted item that `(report_id, item_index)` derives from
    ///
    /// Returns `item_index` itself when the item has no recorded parent, and
    /// `None` when the lookup could not complete.
    pub async fn get_root_item_index(&self, report_id: ReportId, item_index: i32) -> Option<i32> {
        let item = ItemRef::new(report_id, item_index);
        match self.bounded(self.store.root_item(item, self.max_depth)).await {
            Ok(Some(root)) => Some(root.index),
            Ok(None) => Some(item_index),
            Err(e) => {
                log_lineage_degraded!("get_root_item_index", item, e);
                None
            }
        }
    }

    /// Materializes the item ancestor relation for `terminal_report_ids`
    ///
    /// On failure the returned graph is empty and flagged as degraded.
    pub async fn build_item_ancestor_graph(
        &self,
        terminal_report_ids: &[ReportId],
    ) -> ItemAncestorGraph {
        if terminal_report_ids.is_empty() {
            return ItemAncestorGraph::new(Vec::new());
        }

        match self
            .bounded(
                self.store
                    .item_ancestor_graph(terminal_report_ids, self.max_depth),
            )
            .await
        {
            Ok(rows) => {
                tracing::debug!(
                    terminals = terminal_report_ids.len(),
                    rows = rows.len(),
                    "Built item ancestor graph"
                );
                ItemAncestorGraph::new(rows)
            }
            Err(e) => {
                log_lineage_degraded!(
                    "build_item_ancestor_graph",
                    format!("{} terminal reports", terminal_report_ids.len()),
                    e
                );
                ItemAncestorGraph::degraded()
            }
        }
    }

    /// Nearest ancestor of `report_id` produced by `step`
    pub async fn get_ancestor_report(
        &self,
        report_id: ReportId,
        step: PipelineStep,
    ) -> Option<Report> {
        let mut nodes = match self.ancestor_walk(&[report_id]).await {
            Ok(nodes) => nodes,
            Err(e) => {
                log_lineage_degraded!("get_ancestor_report", report_id, e);
                return None;
            }
        };
        nodes.sort_by_key(|node| node.depth);

        let ids: Vec<ReportId> = nodes.iter().map(|node| node.report_id).collect();
        self.get_reports(&ids)
            .await
            .into_iter()
            .find(|report| report.pipeline_step == step)
    }
}

impl std::fmt::Debug for ReportGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportGraph")
            .field("store", &self.store.backend_name())
            .field("max_depth", &self.max_depth)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

//! Lineage store abstraction
//!
//! This module defines the trait that storage adapters must implement to
//! persist reports and lineage and to answer recursive graph queries.

use crate::domain::{
    ItemGraphRow, ItemLineage, ItemRef, LineageNode, PipelineStep, Report, ReportId, Result,
};
use async_trait::async_trait;

/// One report written by a pipeline step together with its lineage
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// The new report
    pub report: Report,

    /// Reports it was derived from
    pub parents: Vec<ReportId>,

    /// Per-item links into the parents
    pub items: Vec<ItemLineage>,
}

impl StepOutput {
    /// A report with no parents (a submission)
    pub fn root(report: Report) -> Self {
        Self {
            report,
            parents: Vec::new(),
            items: Vec::new(),
        }
    }

    /// A report derived from `parents`
    pub fn derived(report: Report, parents: Vec<ReportId>) -> Self {
        Self {
            report,
            parents,
            items: Vec::new(),
        }
    }

    pub fn with_items(mut self, items: Vec<ItemLineage>) -> Self {
        self.items = items;
        self
    }

    pub fn report_id(&self) -> ReportId {
        self.report.report_id
    }
}

/// Persistence and recursive queries over reports and their lineage
///
/// Writes are append-only. Every walk is answered by one consistent read.
#[async_trait]
pub trait LineageStore: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Test the store connection
    async fn test_connection(&self) -> Result<()>;

    /// Create tables and indexes if they don't exist
    async fn ensure_schema(&self) -> Result<()>;

    /// Fetch one report row
    async fn fetch_report(&self, report_id: ReportId) -> Result<Option<Report>>;

    /// Fetch several report rows; unknown ids are skipped
    async fn fetch_reports(&self, report_ids: &[ReportId]) -> Result<Vec<Report>>;

    /// Persist the outputs of one pipeline step atomically
    ///
    /// # Errors
    ///
    /// Fails without writing anything if any parent report does not exist
    /// (neither stored nor earlier in `outputs`) or the write fails.
    async fn persist_step(&self, outputs: &[StepOutput]) -> Result<()>;

    /// Every report reachable parent-ward from `starts`
    async fn ancestor_walk(&self, starts: &[ReportId], max_depth: usize)
        -> Result<Vec<LineageNode>>;

    /// Every report reachable child-ward from `starts`, optionally only those
    /// produced by `step`
    async fn descendant_walk(
        &self,
        starts: &[ReportId],
        step: Option<PipelineStep>,
        max_depth: usize,
    ) -> Result<Vec<LineageNode>>;

    /// Direct item parents, ordered by parent report id
    async fn item_parents(&self, item: ItemRef) -> Result<Vec<ItemRef>>;

    /// The furthest item reachable by following item parents, or `None` when
    /// the item has no recorded parent
    async fn root_item(&self, item: ItemRef, max_depth: usize) -> Result<Option<ItemRef>>;

    /// Item ancestor rows for every item of every terminal report
    async fn item_ancestor_graph(
        &self,
        terminal_report_ids: &[ReportId],
        max_depth: usize,
    ) -> Result<Vec<ItemGraphRow>>;
}

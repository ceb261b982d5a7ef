//! PostgreSQL row models
//!
//! Conversions between `tokio_postgres` rows and domain types.

use crate::domain::{
    CourierError, ItemGraphRow, ItemRef, LineageNode, PipelineStep, Report, ReportId, Result,
    Topic,
};
use chrono::{DateTime, Utc};
use std::str::FromStr;
use tokio_postgres::Row;
use uuid::Uuid;

/// Columns selected for a report row, in `report_file` order
pub const REPORT_COLUMNS: &str = "report_id, topic, body_location, item_count, created_at, \
     pipeline_step, sending_org, sending_org_client, receiving_org, receiving_org_svc";

/// A `report_file` row
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub report_id: Uuid,
    pub topic: String,
    pub body_location: String,
    pub item_count: i32,
    pub created_at: DateTime<Utc>,
    pub pipeline_step: String,
    pub sending_org: Option<String>,
    pub sending_org_client: Option<String>,
    pub receiving_org: Option<String>,
    pub receiving_org_svc: Option<String>,
}

impl ReportRow {
    pub fn from_row(row: &Row) -> Self {
        Self {
            report_id: row.get("report_id"),
            topic: row.get("topic"),
            body_location: row.get("body_location"),
            item_count: row.get("item_count"),
            created_at: row.get("created_at"),
            pipeline_step: row.get("pipeline_step"),
            sending_org: row.get("sending_org"),
            sending_org_client: row.get("sending_org_client"),
            receiving_org: row.get("receiving_org"),
            receiving_org_svc: row.get("receiving_org_svc"),
        }
    }

    /// Convert into the domain report
    ///
    /// # Errors
    ///
    /// Returns an error if a stored topic or pipeline step is no longer valid
    pub fn into_domain(self) -> Result<Report> {
        Ok(Report {
            report_id: ReportId::from_uuid(self.report_id),
            topic: Topic::new(self.topic).map_err(CourierError::Database)?,
            body_location: self.body_location,
            item_count: self.item_count,
            created_at: self.created_at,
            pipeline_step: PipelineStep::from_str(&self.pipeline_step)
                .map_err(CourierError::Database)?,
            sending_org: self.sending_org,
            sending_org_client: self.sending_org_client,
            receiving_org: self.receiving_org,
            receiving_org_svc: self.receiving_org_svc,
        })
    }
}

/// Reads a walk row (`report_id`, `path`, `depth`, `has_parent`, `known`)
pub fn lineage_node_from_row(row: &Row) -> LineageNode {
    let report_id: Uuid = row.get("report_id");
    let depth: i32 = row.get("depth");
    LineageNode {
        report_id: ReportId::from_uuid(report_id),
        path: row.get("path"),
        depth: usize::try_from(depth).unwrap_or_default(),
        has_parent: row.get("has_parent"),
        known: row.get("known"),
    }
}

/// Reads an item graph row
pub fn item_graph_row_from_row(row: &Row) -> ItemGraphRow {
    let starting: Uuid = row.get("starting_report_id");
    let parent: Uuid = row.get("parent_report_id");
    ItemGraphRow {
        starting_report_id: ReportId::from_uuid(starting),
        parent_report_id: ReportId::from_uuid(parent),
        parent_index: row.get("parent_index"),
        parent_is_root: row.get("parent_is_root"),
        path: row.get("path"),
    }
}

/// Reads an `(parent_report_id, parent_index)` pair
pub fn item_ref_from_row(row: &Row) -> ItemRef {
    let report_id: Uuid = row.get("parent_report_id");
    ItemRef::new(ReportId::from_uuid(report_id), row.get("parent_index"))
}

/// Converts a max depth into the `INTEGER` parameter used in recursive queries
pub fn depth_param(max_depth: usize) -> i32 {
    i32::try_from(max_depth).unwrap_or(i32::MAX)
}

/// Converts report ids into a `UUID[]` parameter
pub fn uuid_array(ids: &[ReportId]) -> Vec<Uuid> {
    ids.iter().map(|id| id.into_inner()).collect()
}

//! PostgreSQL adapter implementing the lineage store
//!
//! Every walk is pushed down as one `WITH RECURSIVE` statement. The recursion
//! carries a depth counter and the visited path so a corrupted graph cannot
//! loop forever.

use crate::adapters::database::traits::{LineageStore, StepOutput};
use crate::adapters::postgresql::client::{map_query_error, PostgreSQLClient};
use crate::adapters::postgresql::models::{
    depth_param, item_graph_row_from_row, item_ref_from_row, lineage_node_from_row, uuid_array,
    ReportRow, REPORT_COLUMNS,
};
use crate::domain::{
    ItemGraphRow, ItemRef, LineageError, LineageNode, PipelineStep, Report, ReportId, Result,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

const ANCESTOR_WALK_SQL: &str = r#"
WITH RECURSIVE walk(report_id, path, depth, is_cycle) AS (
    SELECT rl.parent_report_id,
           ARRAY[rl.child_report_id, rl.parent_report_id],
           1,
           rl.parent_report_id = rl.child_report_id
    FROM report_lineage rl
    WHERE rl.child_report_id = ANY($1)
  UNION ALL
    SELECT rl.parent_report_id,
           w.path || rl.parent_report_id,
           w.depth + 1,
           rl.parent_report_id = ANY(w.path)
    FROM report_lineage rl
    JOIN walk w ON rl.child_report_id = w.report_id
    WHERE NOT w.is_cycle AND w.depth <= $2
)
SELECT w.report_id,
       array_to_string(w.path, '->') AS path,
       w.depth,
       w.is_cycle,
       EXISTS (SELECT 1 FROM report_lineage p WHERE p.child_report_id = w.report_id) AS has_parent,
       EXISTS (SELECT 1 FROM report_file rf WHERE rf.report_id = w.report_id) AS known
FROM walk w
ORDER BY w.depth, w.report_id
"#;

const DESCENDANT_WALK_SQL: &str = r#"
WITH RECURSIVE walk(report_id, path, depth, is_cycle) AS (
    SELECT rl.child_report_id,
           ARRAY[rl.parent_report_id, rl.child_report_id],
           1,
           rl.parent_report_id = rl.child_report_id
    FROM report_lineage rl
    WHERE rl.parent_report_id = ANY($1)
  UNION ALL
    SELECT rl.child_report_id,
           w.path || rl.child_report_id,
           w.depth + 1,
           rl.child_report_id = ANY(w.path)
    FROM report_lineage rl
    JOIN walk w ON rl.parent_report_id = w.report_id
    WHERE NOT w.is_cycle AND w.depth <= $2
)
SELECT w.report_id,
       array_to_string(w.path, '->') AS path,
       w.depth,
       w.is_cycle,
       TRUE AS has_parent,
       rf.report_id IS NOT NULL AS known
FROM walk w
LEFT JOIN report_file rf ON rf.report_id = w.report_id
WHERE ($3::TEXT IS NULL OR rf.pipeline_step = $3::TEXT)
ORDER BY w.depth, w.report_id
"#;

const ROOT_ITEM_SQL: &str = r#"
WITH RECURSIVE chain(parent_report_id, parent_index, depth, path) AS (
    SELECT il.parent_report_id,
           il.parent_index,
           1,
           ARRAY[il.child_report_id, il.parent_report_id]
    FROM item_lineage il
    WHERE il.child_report_id = $1 AND il.child_index = $2
  UNION ALL
    SELECT il.parent_report_id,
           il.parent_index,
           c.depth + 1,
           c.path || il.parent_report_id
    FROM item_lineage il
    JOIN chain c ON il.child_report_id = c.parent_report_id AND il.child_index = c.parent_index
    WHERE c.depth <= $3 AND NOT il.parent_report_id = ANY(c.path)
)
SELECT parent_report_id, parent_index, depth
FROM chain
ORDER BY depth DESC, parent_report_id ASC
LIMIT 1
"#;

const ITEM_ANCESTOR_GRAPH_SQL: &str = r#"
WITH RECURSIVE item_graph(starting_report_id, parent_report_id, parent_index, depth, path) AS (
    SELECT il.child_report_id,
           il.parent_report_id,
           il.parent_index,
           1,
           '(' || il.child_report_id || ',' || il.child_index || ')->('
               || il.parent_report_id || ',' || il.parent_index || ')'
    FROM item_lineage il
    WHERE il.child_report_id = ANY($1)
  UNION ALL
    SELECT g.starting_report_id,
           il.parent_report_id,
           il.parent_index,
           g.depth + 1,
           g.path || '->(' || il.parent_report_id || ',' || il.parent_index || ')'
    FROM item_lineage il
    JOIN item_graph g
      ON il.child_report_id = g.parent_report_id AND il.child_index = g.parent_index
    WHERE g.depth < $2
)
SELECT DISTINCT ON (g.starting_report_id, g.parent_report_id, g.parent_index)
       g.starting_report_id,
       g.parent_report_id,
       g.parent_index,
       g.path,
       NOT EXISTS (
           SELECT 1 FROM report_lineage rl WHERE rl.child_report_id = g.parent_report_id
       ) AS parent_is_root
FROM item_graph g
ORDER BY g.starting_report_id, g.parent_report_id, g.parent_index, g.depth
"#;

const INSERT_REPORT_SQL: &str = r#"
INSERT INTO report_file (
    report_id, topic, body_location, item_count, created_at, pipeline_step,
    sending_org, sending_org_client, receiving_org, receiving_org_svc
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
"#;

const INSERT_EDGE_SQL: &str = r#"
INSERT INTO report_lineage (parent_report_id, child_report_id)
VALUES ($1, $2)
ON CONFLICT (parent_report_id, child_report_id) DO NOTHING
"#;

const INSERT_ITEM_SQL: &str = r#"
INSERT INTO item_lineage (
    parent_report_id, parent_index, child_report_id, child_index, tracking_id, item_hash
) VALUES ($1, $2, $3, $4, $5, $6)
"#;

/// PostgreSQL implementation of [`LineageStore`]
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLAdapter {
    /// Create a new PostgreSQL adapter
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Create a new PostgreSQL adapter with an Arc-wrapped client
    pub fn new_with_arc(client: Arc<PostgreSQLClient>) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }

    /// Runs a walk statement; `$3` is bound only for the descendant walk,
    /// where `None` keeps every pipeline step
    async fn walk(
        &self,
        sql: &str,
        starts: &[ReportId],
        step_filter: Option<Option<PipelineStep>>,
        max_depth: usize,
    ) -> Result<Vec<LineageNode>> {
        if starts.is_empty() {
            return Ok(Vec::new());
        }

        let ids = uuid_array(starts);
        let depth = depth_param(max_depth);
        let rows = match step_filter {
            None => self.client.query(sql, &[&ids, &depth]).await?,
            Some(step) => {
                let step = step.map(|s| s.as_str().to_string());
                self.client.query(sql, &[&ids, &depth, &step]).await?
            }
        };

        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for row in &rows {
            let is_cycle: bool = row.get("is_cycle");
            let node = lineage_node_from_row(row);
            if is_cycle {
                return Err(LineageError::Cycle { path: node.path }.into());
            }
            if node.depth > max_depth {
                return Err(LineageError::IterationLimit { limit: max_depth }.into());
            }
            if seen.insert(node.report_id) {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }
}

#[async_trait]
impl LineageStore for PostgreSQLAdapter {
    fn backend_name(&self) -> &'static str {
        "postgresql"
    }

    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.client.ensure_schema().await
    }

    async fn fetch_report(&self, report_id: ReportId) -> Result<Option<Report>> {
        let query = format!("SELECT {REPORT_COLUMNS} FROM report_file WHERE report_id = $1");
        let id = report_id.into_inner();
        let rows = self.client.query(&query, &[&id]).await?;

        rows.first()
            .map(|row| ReportRow::from_row(row).into_domain())
            .transpose()
    }

    async fn fetch_reports(&self, report_ids: &[ReportId]) -> Result<Vec<Report>> {
        if report_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!("SELECT {REPORT_COLUMNS} FROM report_file WHERE report_id = ANY($1)");
        let ids = uuid_array(report_ids);
        let rows = self.client.query(&query, &[&ids]).await?;

        let mut reports = rows
            .iter()
            .map(|row| ReportRow::from_row(row).into_domain())
            .collect::<Result<Vec<_>>>()?;
        reports.sort_by_key(|report| {
            report_ids
                .iter()
                .position(|id| *id == report.report_id)
                .unwrap_or(usize::MAX)
        });
        Ok(reports)
    }

    async fn persist_step(&self, outputs: &[StepOutput]) -> Result<()> {
        let mut conn = self.client.get_connection().await?;
        let tx = conn.transaction().await.map_err(map_query_error)?;

        let batch: HashSet<ReportId> = outputs.iter().map(StepOutput::report_id).collect();
        let external: Vec<Uuid> = outputs
            .iter()
            .flat_map(|output| output.parents.iter())
            .filter(|parent| !batch.contains(parent))
            .map(|parent| parent.into_inner())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        if !external.is_empty() {
            let rows = tx
                .query(
                    "SELECT report_id FROM report_file WHERE report_id = ANY($1)",
                    &[&external],
                )
                .await
                .map_err(map_query_error)?;
            let found: HashSet<Uuid> = rows.iter().map(|row| row.get("report_id")).collect();

            for output in outputs {
                if let Some(missing) = output
                    .parents
                    .iter()
                    .find(|p| !batch.contains(p) && !found.contains(p.as_uuid()))
                {
                    // Dropping the transaction rolls it back
                    return Err(LineageError::MissingParent {
                        parent: missing.to_string(),
                        child: output.report_id().to_string(),
                    }
                    .into());
                }
            }
        }

        for output in outputs {
            let report = &output.report;
            tx.execute(
                INSERT_REPORT_SQL,
                &[
                    report.report_id.as_uuid(),
                    &report.topic.as_str(),
                    &report.body_location,
                    &report.item_count,
                    &report.created_at,
                    &report.pipeline_step.as_str(),
                    &report.sending_org,
                    &report.sending_org_client,
                    &report.receiving_org,
                    &report.receiving_org_svc,
                ],
            )
            .await
            .map_err(map_query_error)?;
        }

        for output in outputs {
            for parent in &output.parents {
                tx.execute(INSERT_EDGE_SQL, &[parent.as_uuid(), output.report.report_id.as_uuid()])
                    .await
                    .map_err(map_query_error)?;
            }
            for item in &output.items {
                tx.execute(
                    INSERT_ITEM_SQL,
                    &[
                        item.parent_report_id.as_uuid(),
                        &item.parent_index,
                        item.child_report_id.as_uuid(),
                        &item.child_index,
                        &item.tracking_id,
                        &item.item_hash,
                    ],
                )
                .await
                .map_err(map_query_error)?;
            }
        }

        tx.commit().await.map_err(map_query_error)?;

        tracing::debug!(reports = outputs.len(), "Persisted step outputs to PostgreSQL");
        Ok(())
    }

    async fn ancestor_walk(
        &self,
        starts: &[ReportId],
        max_depth: usize,
    ) -> Result<Vec<LineageNode>> {
        self.walk(ANCESTOR_WALK_SQL, starts, None, max_depth).await
    }

    async fn descendant_walk(
        &self,
        starts: &[ReportId],
        step: Option<PipelineStep>,
        max_depth: usize,
    ) -> Result<Vec<LineageNode>> {
        self.walk(DESCENDANT_WALK_SQL, starts, Some(step), max_depth)
            .await
    }

    async fn item_parents(&self, item: ItemRef) -> Result<Vec<ItemRef>> {
        let rows = self
            .client
            .query(
                "SELECT parent_report_id, parent_index FROM item_lineage \
                 WHERE child_report_id = $1 AND child_index = $2 \
                 ORDER BY parent_report_id ASC, parent_index ASC",
                &[item.report_id.as_uuid(), &item.index],
            )
            .await?;
        Ok(rows.iter().map(item_ref_from_row).collect())
    }

    async fn root_item(&self, item: ItemRef, max_depth: usize) -> Result<Option<ItemRef>> {
        let depth = depth_param(max_depth);
        let rows = self
            .client
            .query(ROOT_ITEM_SQL, &[item.report_id.as_uuid(), &item.index, &depth])
            .await?;

        match rows.first() {
            None => Ok(None),
            Some(row) => {
                let reached: i32 = row.get("depth");
                if usize::try_from(reached).unwrap_or(usize::MAX) > max_depth {
                    return Err(LineageError::IterationLimit { limit: max_depth }.into());
                }
                Ok(Some(item_ref_from_row(row)))
            }
        }
    }

    async fn item_ancestor_graph(
        &self,
        terminal_report_ids: &[ReportId],
        max_depth: usize,
    ) -> Result<Vec<ItemGraphRow>> {
        if terminal_report_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = uuid_array(terminal_report_ids);
        let depth = depth_param(max_depth);
        let rows = self
            .client
            .query(ITEM_ANCESTOR_GRAPH_SQL, &[&ids, &depth])
            .await?;
        Ok(rows.iter().map(item_graph_row_from_row).collect())
    }
}

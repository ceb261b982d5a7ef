//! Lineage command implementation
//!
//! This module implements the `lineage` command family for inspecting the
//! report graph held by the configured lineage store.

use crate::adapters::database::create_lineage_store;
use crate::config::load_config;
use crate::config::schema::CourierConfig;
use crate::core::lineage::ReportGraph;
use crate::domain::{LineageNode, PipelineStep, ReportId};
use clap::{Args, Subcommand};

/// Arguments for the lineage command
#[derive(Args, Debug)]
pub struct LineageArgs {
    #[command(subcommand)]
    pub command: LineageCommand,
}

/// Lineage queries
#[derive(Subcommand, Debug)]
pub enum LineageCommand {
    /// Submitted reports a report derives from
    Roots {
        /// Report to resolve
        report_id: ReportId,
    },

    /// Every ancestor of a report, nearest first
    Ancestors {
        /// Report to start from
        report_id: ReportId,
    },

    /// Every descendant of a report
    Descendants {
        /// Report to start from
        report_id: ReportId,

        /// Only list descendants produced by this pipeline step
        #[arg(long)]
        step: Option<PipelineStep>,
    },

    /// Submitted item index an item derives from
    ItemRoot {
        /// Report holding the item
        report_id: ReportId,

        /// 1-based item index within the report
        index: i32,
    },

    /// Item ancestor graph for one or more terminal reports
    ItemGraph {
        /// Terminal reports to start from
        #[arg(required = true, num_args = 1..)]
        report_ids: Vec<ReportId>,
    },
}

impl LineageArgs {
    /// Execute the lineage command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let graph = match open_graph(&config).await {
            Ok(g) => g,
            Err(e) => {
                println!("❌ Failed to connect to lineage store");
                println!("   Error: {e}");
                return Ok(4);
            }
        };

        self.run(&graph).await
    }

    /// Runs the query against an already opened graph
    pub async fn run(&self, graph: &ReportGraph) -> anyhow::Result<i32> {
        match &self.command {
            LineageCommand::Roots { report_id } => roots(graph, *report_id).await,
            LineageCommand::Ancestors { report_id } => {
                tracing::info!(report_id = %report_id, "Walking ancestors");
                match graph.ancestor_walk(&[*report_id]).await {
                    Ok(nodes) => Ok(print_nodes("ancestor", &nodes)),
                    Err(e) => {
                        println!("❌ Ancestor walk failed");
                        println!("   Error: {e}");
                        Ok(5)
                    }
                }
            }
            LineageCommand::Descendants { report_id, step } => {
                tracing::info!(report_id = %report_id, step = ?step, "Walking descendants");
                match graph.descendant_walk(&[*report_id], *step).await {
                    Ok(nodes) => Ok(print_nodes("descendant", &nodes)),
                    Err(e) => {
                        println!("❌ Descendant walk failed");
                        println!("   Error: {e}");
                        Ok(5)
                    }
                }
            }
            LineageCommand::ItemRoot { report_id, index } => {
                match graph.get_root_item_index(*report_id, *index).await {
                    Some(root) => {
                        println!("📍 Item ({report_id},{index}) derives from submitted item {root}");
                        Ok(0)
                    }
                    None => {
                        println!("❌ Item lineage lookup did not complete");
                        Ok(5)
                    }
                }
            }
            LineageCommand::ItemGraph { report_ids } => item_graph(graph, report_ids).await,
        }
    }
}

async fn open_graph(config: &CourierConfig) -> crate::domain::Result<ReportGraph> {
    let store = create_lineage_store(config).await?;
    Ok(ReportGraph::new(store)
        .with_max_depth(config.lineage.max_depth)
        .with_query_timeout(config.lineage.query_timeout()))
}

async fn roots(graph: &ReportGraph, report_id: ReportId) -> anyhow::Result<i32> {
    tracing::info!(report_id = %report_id, "Resolving root reports");

    let rows = graph.get_root_report_rows(report_id).await;
    if rows.is_empty() {
        println!("No root reports found for {report_id}.");
        println!("The report is either a submission itself or its lineage could not be read.");
        return Ok(0);
    }

    println!("🌱 Found {} root report(s):", rows.len());
    println!();
    println!(
        "{:<38} {:<20} {:<30} {:<6}",
        "Report ID", "Topic", "Sender", "Items"
    );
    println!("{}", "-".repeat(96));
    for report in rows {
        println!(
            "{:<38} {:<20} {:<30} {:<6}",
            report.report_id.to_string(),
            report.topic.as_str(),
            report.sender_name().unwrap_or_else(|| "-".to_string()),
            report.item_count
        );
    }
    println!();
    Ok(0)
}

async fn item_graph(graph: &ReportGraph, report_ids: &[ReportId]) -> anyhow::Result<i32> {
    tracing::info!(terminals = report_ids.len(), "Building item ancestor graph");

    let item_graph = graph.build_item_ancestor_graph(report_ids).await;
    if item_graph.is_degraded() {
        println!("❌ Item ancestor graph could not be built");
        return Ok(5);
    }
    if item_graph.is_empty() {
        println!("No item lineage recorded for the given reports.");
        return Ok(0);
    }

    println!("🧬 Item ancestor graph ({} rows):", item_graph.len());
    println!();
    println!(
        "{:<38} {:<38} {:<6} {:<5}",
        "Starting Report", "Ancestor Report", "Index", "Root"
    );
    println!("{}", "-".repeat(90));
    for row in item_graph.rows() {
        println!(
            "{:<38} {:<38} {:<6} {:<5}",
            row.starting_report_id.to_string(),
            row.parent_report_id.to_string(),
            row.parent_index,
            if row.parent_is_root { "yes" } else { "" }
        );
    }
    println!();
    println!("Submitted items: {}", item_graph.submitted_items().len());
    Ok(0)
}

fn print_nodes(label: &str, nodes: &[LineageNode]) -> i32 {
    if nodes.is_empty() {
        println!("No {label} reports found.");
        return 0;
    }

    println!("Found {} {label} report(s):", nodes.len());
    println!();
    println!("{:<38} {:<6} {:<5} Path", "Report ID", "Depth", "Root");
    println!("{}", "-".repeat(96));
    for node in nodes {
        println!(
            "{:<38} {:<6} {:<5} {}",
            node.report_id.to_string(),
            node.depth,
            if node.is_root() { "yes" } else { "" },
            node.path
        );
    }
    println!();
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::{LineageStore, StepOutput};
    use crate::adapters::memory::InMemoryLineageStore;
    use crate::domain::{Report, Topic};
    use std::sync::Arc;

    fn report(step: PipelineStep) -> Report {
        Report::builder()
            .topic(Topic::new("full-elr").unwrap())
            .body_location("blob://x")
            .pipeline_step(step)
            .build()
            .unwrap()
    }

    async fn chain() -> (ReportGraph, ReportId, ReportId) {
        let store = Arc::new(InMemoryLineageStore::new());
        let root = report(PipelineStep::Receive);
        let child = report(PipelineStep::Convert);
        store
            .persist_step(&[StepOutput::root(root.clone())])
            .await
            .unwrap();
        store
            .persist_step(&[StepOutput::derived(child.clone(), vec![root.report_id])])
            .await
            .unwrap();
        (ReportGraph::new(store), root.report_id, child.report_id)
    }

    #[tokio::test]
    async fn test_roots_command() {
        let (graph, _, child) = chain().await;
        let args = LineageArgs {
            command: LineageCommand::Roots { report_id: child },
        };
        assert_eq!(args.run(&graph).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_descendants_command() {
        let (graph, root, _) = chain().await;
        let args = LineageArgs {
            command: LineageCommand::Descendants {
                report_id: root,
                step: Some(PipelineStep::Convert),
            },
        };
        assert_eq!(args.run(&graph).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_config_exits_with_config_error() {
        let args = LineageArgs {
            command: LineageCommand::Ancestors {
                report_id: ReportId::new(),
            },
        };
        assert_eq!(args.execute("does-not-exist.toml").await.unwrap(), 2);
    }
}

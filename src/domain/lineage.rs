//! Lineage domain model
//!
//! Edges between reports, per-item derivation links, and the row shapes
//! produced by graph walks.

use super::ids::ReportId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Directed derivation edge from a parent report to a child report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineageEdge {
    pub parent_report_id: ReportId,
    pub child_report_id: ReportId,
}

impl LineageEdge {
    pub fn new(parent_report_id: ReportId, child_report_id: ReportId) -> Self {
        Self {
            parent_report_id,
            child_report_id,
        }
    }
}

/// A specific item inside a report (indices are 1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemRef {
    pub report_id: ReportId,
    pub index: i32,
}

impl ItemRef {
    pub fn new(report_id: ReportId, index: i32) -> Self {
        Self { report_id, index }
    }
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.report_id, self.index)
    }
}

/// Per-item derivation link: `(child report, child index) -> (parent report, parent index)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLineage {
    pub parent_report_id: ReportId,
    pub parent_index: i32,
    pub child_report_id: ReportId,
    pub child_index: i32,

    /// Tracking id taken from the bundle identifier
    pub tracking_id: Option<String>,

    /// Digest of the item content
    pub item_hash: Option<String>,
}

impl ItemLineage {
    pub fn new(parent: ItemRef, child: ItemRef) -> Self {
        Self {
            parent_report_id: parent.report_id,
            parent_index: parent.index,
            child_report_id: child.report_id,
            child_index: child.index,
            tracking_id: None,
            item_hash: None,
        }
    }

    pub fn with_tracking_id(mut self, tracking_id: impl Into<String>) -> Self {
        self.tracking_id = Some(tracking_id.into());
        self
    }

    pub fn with_item_hash(mut self, item_hash: impl Into<String>) -> Self {
        self.item_hash = Some(item_hash.into());
        self
    }

    pub fn parent(&self) -> ItemRef {
        ItemRef::new(self.parent_report_id, self.parent_index)
    }

    pub fn child(&self) -> ItemRef {
        ItemRef::new(self.child_report_id, self.child_index)
    }
}

/// One report reached by an ancestor or descendant walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageNode {
    /// The reached report
    pub report_id: ReportId,

    /// Visited ids from the starting report to this one, joined with `->`
    pub path: String,

    /// Number of edges between the starting report and this one
    pub depth: usize,

    /// Whether this report has a recorded parent edge
    pub has_parent: bool,

    /// Whether a report row exists for this id
    pub known: bool,
}

impl LineageNode {
    /// A node with no parent edge, or one whose row is missing, ends the walk
    pub fn is_root(&self) -> bool {
        !self.has_parent || !self.known
    }
}

/// One row of the materialized item ancestor graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemGraphRow {
    /// Terminal report the walk started from
    pub starting_report_id: ReportId,

    /// Ancestor report holding the item
    pub parent_report_id: ReportId,

    /// Index of the item in the ancestor report
    pub parent_index: i32,

    /// Whether the ancestor report has no parent of its own
    pub parent_is_root: bool,

    /// Path label such as `(child,1)->(parent,3)`
    pub path: String,
}

/// Reusable relation of `(starting report, ancestor report, ancestor item index)` rows
///
/// Built by a single recursive query over item lineage for a set of
/// terminal reports. A `degraded` relation is what was available when the
/// query timed out or failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemAncestorGraph {
    rows: Vec<ItemGraphRow>,
    degraded: bool,
}

impl ItemAncestorGraph {
    pub fn new(rows: Vec<ItemGraphRow>) -> Self {
        Self {
            rows,
            degraded: false,
        }
    }

    /// An empty relation marking a lineage lookup that could not complete
    pub fn degraded() -> Self {
        Self {
            rows: Vec::new(),
            degraded: true,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn rows(&self) -> &[ItemGraphRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows reached from one terminal report
    pub fn for_starting_report(&self, report_id: ReportId) -> impl Iterator<Item = &ItemGraphRow> {
        self.rows
            .iter()
            .filter(move |row| row.starting_report_id == report_id)
    }

    /// Rows whose ancestor is a submitted (root) report
    pub fn root_rows(&self) -> impl Iterator<Item = &ItemGraphRow> {
        self.rows.iter().filter(|row| row.parent_is_root)
    }

    /// Distinct submitted items that ended up in any of the terminal reports
    pub fn submitted_items(&self) -> BTreeSet<ItemRef> {
        self.root_rows()
            .map(|row| ItemRef::new(row.parent_report_id, row.parent_index))
            .collect()
    }

    /// Whether a given submitted item reached any terminal report
    pub fn contains_item(&self, item: ItemRef) -> bool {
        self.rows
            .iter()
            .any(|row| row.parent_report_id == item.report_id && row.parent_index == item.index)
    }
}

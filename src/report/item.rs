//! The immutable exported report tree.

use std::sync::Arc;

use serde_json::json;

use super::node::Severity;
use super::object::DiscrepancyObject;

/// One exported report row: expanded message, rolled-up severity and
/// autofix capability, and the final object list. Produced once per test by
/// [`super::ReportNode::export`] and consumed read-only from then on.
#[derive(Debug)]
pub struct ReportItem {
    /// Raw template text the row was exported from.
    pub name: String,
    /// Human-readable message with counts substituted.
    pub msg: String,
    /// Machine-readable variant keeping optional-clause markers.
    pub xml_msg: String,
    pub severity: Severity,
    pub autofix: bool,
    pub extended: bool,
    pub summary: bool,
    pub count: usize,
    pub objects: Vec<Arc<DiscrepancyObject>>,
    pub children: Vec<ReportItem>,
}

impl ReportItem {
    /// Total rows in this subtree, including this one.
    pub fn row_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.row_count()).sum::<usize>()
    }

    /// JSON projection used by the `-f json` output format.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "msg": self.msg,
            "severity": self.severity,
            "autofix": self.autofix,
            "extended": self.extended,
            "summary": self.summary,
            "count": self.count,
            "objects": self.objects.iter().map(|o| o.text()).collect::<Vec<_>>(),
            "children": self.children.iter().map(|c| c.to_json()).collect::<Vec<_>>(),
        })
    }
}

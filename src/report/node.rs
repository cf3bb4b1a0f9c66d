//! The generic aggregation trie every discrepancy test writes into.
//!
//! Test bodies address buckets by message string and never pre-declare them:
//! `report.bucket("[n] thing[s]").add(obj)` creates the bucket on first use.
//! At summarize time each test's tree is exported once into an immutable
//! [`ReportItem`] tree with counts substituted, severity rolled up, and leaf
//! objects hoisted into ancestor counts.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use super::item::ReportItem;
use super::object::DiscrepancyObject;
use super::template::Template;

/// Severity of a report bucket, lowest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    #[default]
    Warning,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

/// A named aggregation bucket: matched objects plus child buckets keyed by
/// message string, insertion order preserved.
#[derive(Debug, Default)]
pub struct ReportNode {
    name: String,
    children: Vec<ReportNode>,
    child_index: HashMap<String, usize>,
    objects: Vec<Arc<DiscrepancyObject>>,
    seen: HashSet<usize>,
    severity: Severity,
    autofix: bool,
    extended: bool,
    summary: bool,
    no_recurse: bool,
    count: Option<usize>,
}

impl ReportNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ------------------------------------------------------------------
    // Flags and severity
    // ------------------------------------------------------------------

    pub fn set_severity(&mut self, severity: Severity) -> &mut Self {
        self.severity = severity;
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Mark this bucket as carrying an automatic fix.
    pub fn set_autofix(&mut self, autofix: bool) -> &mut Self {
        self.autofix = autofix;
        self
    }

    /// Detail-only bucket, hidden unless verbose output is requested.
    pub fn set_extended(&mut self, extended: bool) -> &mut Self {
        self.extended = extended;
        self
    }

    /// Collapsible summary row.
    pub fn set_summary(&mut self, summary: bool) -> &mut Self {
        self.summary = summary;
        self
    }

    /// Child objects should not bubble up into this bucket's own list.
    pub fn set_no_recurse(&mut self, no_recurse: bool) -> &mut Self {
        self.no_recurse = no_recurse;
        self
    }

    /// Override the count used for template substitution (for "0 of N"
    /// style denominators that differ from the matched-object count).
    pub fn set_count(&mut self, count: usize) -> &mut Self {
        self.count = Some(count);
        self
    }

    // ------------------------------------------------------------------
    // Accumulation
    // ------------------------------------------------------------------

    /// Keyed child lookup; the bucket is created empty on first access and
    /// the same name always yields the same child. Never fails.
    pub fn bucket(&mut self, name: &str) -> &mut ReportNode {
        if let Some(&i) = self.child_index.get(name) {
            return &mut self.children[i];
        }
        let i = self.children.len();
        self.children.push(ReportNode::new(name));
        self.child_index.insert(name.to_string(), i);
        &mut self.children[i]
    }

    /// Append an object, skipping it when already present (identity-based).
    pub fn add(&mut self, obj: Arc<DiscrepancyObject>) -> &mut Self {
        self.add_object(obj, true)
    }

    /// Append an object with explicit dedup control.
    pub fn add_object(&mut self, obj: Arc<DiscrepancyObject>, dedupe: bool) -> &mut Self {
        let key = Arc::as_ptr(&obj) as usize;
        if dedupe && !self.seen.insert(key) {
            return self;
        }
        if !dedupe {
            self.seen.insert(key);
        }
        self.objects.push(obj);
        self
    }

    pub fn objects(&self) -> &[Arc<DiscrepancyObject>] {
        &self.objects
    }

    pub fn children(&self) -> &[ReportNode] {
        &self.children
    }

    /// No objects here and no children anywhere.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.children.is_empty()
    }

    /// Reset to a freshly created state, keeping the name.
    pub fn clear(&mut self) {
        let name = std::mem::take(&mut self.name);
        *self = ReportNode::new(name);
    }

    /// Every object anywhere in this subtree, deduplicated by identity.
    /// The autofix collection pass reads fix candidates from here.
    pub fn all_objects(&self) -> Vec<Arc<DiscrepancyObject>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect_objects(&mut seen, &mut out);
        out
    }

    fn collect_objects(
        &self,
        seen: &mut HashSet<usize>,
        out: &mut Vec<Arc<DiscrepancyObject>>,
    ) {
        for obj in &self.objects {
            if seen.insert(Arc::as_ptr(obj) as usize) {
                out.push(Arc::clone(obj));
            }
        }
        for child in &self.children {
            child.collect_objects(seen, out);
        }
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Deep-union `other` into this node. Children with matching names are
    /// merged recursively; objects are unioned with identity dedup; flags
    /// are OR-ed; severity takes the maximum; explicit counts accumulate.
    pub fn merge(&mut self, other: ReportNode) {
        self.severity = self.severity.max(other.severity);
        self.autofix |= other.autofix;
        self.extended |= other.extended;
        self.summary |= other.summary;
        self.no_recurse |= other.no_recurse;
        self.count = match (self.count, other.count) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
        for obj in other.objects {
            self.add(obj);
        }
        for child in other.children {
            match self.child_index.get(child.name()) {
                Some(&i) => self.children[i].merge(child),
                None => {
                    self.child_index
                        .insert(child.name().to_string(), self.children.len());
                    self.children.push(child);
                }
            }
        }
    }

    /// Collapse a wrapper that turned out to carry exactly one distinct
    /// message: this node is replaced by its only child. No-op otherwise.
    pub fn promote(&mut self) {
        if self.children.len() != 1 {
            return;
        }
        let child = self.children.pop().expect("checked length");
        *self = child;
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Depth-first export into the immutable report tree.
    ///
    /// Severity is the maximum over this node and all descendants, the
    /// autofix capability is OR-ed upward, and child objects are hoisted
    /// into this node's list unless `no_recurse` is set — a parent bucket's
    /// count reflects everything beneath it. Sibling order is the raw name
    /// order, which lets `[*...*]` annotations force a ranking the visible
    /// text would not sort into.
    pub fn export(&self) -> ReportItem {
        let mut order: Vec<usize> = (0..self.children.len()).collect();
        order.sort_by(|&a, &b| self.children[a].name.cmp(&self.children[b].name));

        let children: Vec<ReportItem> = order.iter().map(|&i| self.children[i].export()).collect();

        let severity = children
            .iter()
            .map(|c| c.severity)
            .fold(self.severity, Severity::max);
        let autofix = self.autofix
            || self.objects.iter().any(|o| o.has_fix_anchor())
            || children.iter().any(|c| c.autofix);

        let mut objects = self.objects.clone();
        if !self.no_recurse {
            let mut seen: HashSet<usize> =
                objects.iter().map(|o| Arc::as_ptr(o) as usize).collect();
            for child in &children {
                for obj in &child.objects {
                    if seen.insert(Arc::as_ptr(obj) as usize) {
                        objects.push(Arc::clone(obj));
                    }
                }
            }
        }

        let count = self.count.unwrap_or(objects.len());
        let template = Template::parse(&self.name);

        ReportItem {
            name: self.name.clone(),
            msg: template.expand(count),
            xml_msg: template.expand_xml(count),
            severity,
            autofix,
            extended: self.extended,
            summary: self.summary,
            count,
            objects,
            children,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{NodeKind, RefNode};

    fn obj(label: &str) -> Arc<DiscrepancyObject> {
        let root = RefNode::root(NodeKind::File, 0);
        let node = RefNode::child(&root, NodeKind::Bioseq, 0);
        node.set_label(label);
        Arc::new(DiscrepancyObject::new(node))
    }

    fn fixable(label: &str) -> Arc<DiscrepancyObject> {
        let root = RefNode::root(NodeKind::File, 0);
        let node = RefNode::child(&root, NodeKind::Bioseq, 0);
        node.set_label(label);
        let anchor = RefNode::child(&root, NodeKind::SeqDesc, 0);
        Arc::new(DiscrepancyObject::new(node).with_fix_anchor(anchor))
    }

    #[test]
    fn test_bucket_auto_vivifies_and_is_identity_stable() {
        let mut node = ReportNode::new("root");
        node.bucket("foo").add(obj("a"));
        // same name, same child
        assert_eq!(node.bucket("foo").objects().len(), 1);
        assert_eq!(node.children().len(), 1);
        // fresh bucket is empty
        let fresh = node.bucket("bar");
        assert!(fresh.is_empty());
        assert_eq!(fresh.export().count, 0);
    }

    #[test]
    fn test_add_dedupes_by_identity() {
        let mut node = ReportNode::new("root");
        let o = obj("a");
        node.add(Arc::clone(&o));
        node.add(Arc::clone(&o));
        assert_eq!(node.objects().len(), 1);

        let mut node = ReportNode::new("root");
        node.add_object(Arc::clone(&o), false);
        node.add_object(Arc::clone(&o), false);
        assert_eq!(node.objects().len(), 2);
    }

    #[test]
    fn test_distinct_objects_are_not_deduped() {
        let mut node = ReportNode::new("root");
        node.add(obj("a"));
        node.add(obj("b"));
        assert_eq!(node.objects().len(), 2);
    }

    #[test]
    fn test_export_hoists_child_objects() {
        let mut node = ReportNode::new("[n] total[s]");
        node.bucket("[n] kind A").add(obj("a"));
        node.bucket("[n] kind B").add(obj("b"));
        let item = node.export();
        assert_eq!(item.count, 2);
        assert_eq!(item.msg, "2 totals");
        assert_eq!(item.children.len(), 2);
        assert_eq!(item.children[0].count, 1);
    }

    #[test]
    fn test_no_recurse_blocks_hoisting() {
        let mut node = ReportNode::new("[n] total[s]");
        node.set_no_recurse(true);
        node.bucket("[n] kind A").add(obj("a"));
        let item = node.export();
        assert_eq!(item.count, 0);
        assert_eq!(item.children[0].count, 1);
    }

    #[test]
    fn test_severity_propagates_maximum() {
        let mut node = ReportNode::new("root");
        node.set_severity(Severity::Info);
        node.bucket("child").set_severity(Severity::Fatal);
        node.bucket("other").set_severity(Severity::Warning);
        let item = node.export();
        assert_eq!(item.severity, Severity::Fatal);
        // never lower than any descendant
        for child in &item.children {
            assert!(item.severity >= child.severity);
        }
    }

    #[test]
    fn test_autofix_propagates_or() {
        let mut node = ReportNode::new("root");
        node.bucket("plain").add(obj("a"));
        node.bucket("fixable").add(fixable("b"));
        let item = node.export();
        assert!(item.autofix);
        assert!(!item.children.iter().all(|c| c.autofix));
    }

    #[test]
    fn test_count_override() {
        let mut node = ReportNode::new("[n] of 10 item[s]");
        node.add(obj("a"));
        node.set_count(0);
        let item = node.export();
        assert_eq!(item.count, 0);
        assert_eq!(item.msg, "0 of 10 items");
    }

    #[test]
    fn test_promote_replaces_with_single_child() {
        let mut node = ReportNode::new("wrapper");
        node.add(obj("parent-object"));
        node.bucket("the only message").add(obj("a"));
        node.promote();
        assert_eq!(node.name(), "the only message");
        assert_eq!(node.objects().len(), 1);
        assert_eq!(node.objects()[0].short_text(), "a");
        assert!(node.children().is_empty());
    }

    #[test]
    fn test_promote_noop_with_many_children() {
        let mut node = ReportNode::new("wrapper");
        node.bucket("one");
        node.bucket("two");
        node.promote();
        assert_eq!(node.name(), "wrapper");
        assert_eq!(node.children().len(), 2);
    }

    #[test]
    fn test_merge_unions_children_and_objects() {
        let mut a = ReportNode::new("root");
        a.bucket("shared").add(obj("a1"));
        a.bucket("only-a").add(obj("a2"));

        let mut b = ReportNode::new("root");
        b.bucket("shared").add(obj("b1"));
        b.bucket("only-b").set_severity(Severity::Error);

        a.merge(b);
        assert_eq!(a.children().len(), 3);
        assert_eq!(a.bucket("shared").objects().len(), 2);
        assert_eq!(a.bucket("only-b").severity(), Severity::Error);
    }

    #[test]
    fn test_merge_dedupes_shared_objects() {
        let o = obj("shared");
        let mut a = ReportNode::new("root");
        a.add(Arc::clone(&o));
        let mut b = ReportNode::new("root");
        b.add(Arc::clone(&o));
        a.merge(b);
        assert_eq!(a.objects().len(), 1);
    }

    #[test]
    fn test_export_orders_siblings_by_raw_name() {
        let mut node = ReportNode::new("root");
        node.bucket("[*2*]should come second");
        node.bucket("[*1*]z-message first");
        let item = node.export();
        assert_eq!(item.children[0].msg, "z-message first");
        assert_eq!(item.children[1].msg, "should come second");
    }

    #[test]
    fn test_clear_resets_state() {
        let mut node = ReportNode::new("root");
        node.bucket("x").add(obj("a"));
        node.set_severity(Severity::Fatal);
        node.clear();
        assert!(node.is_empty());
        assert_eq!(node.name(), "root");
        assert_eq!(node.severity(), Severity::default());
    }
}

//! A single flagged occurrence.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::tree::RefNode;

/// One flagged occurrence of a discrepancy.
///
/// Carries the positional identity of the node it reports on, an optional
/// second identity naming the node whose subtree must be rewritten to apply
/// a fix (the two may differ: a test can report on a feature while the fix
/// lives on a descriptor), and an opaque payload only the owning test's
/// autofix callback understands.
pub struct DiscrepancyObject {
    node: Arc<RefNode>,
    fix_anchor: Option<Arc<RefNode>>,
    fixed: AtomicBool,
    payload: Option<Box<dyn Any + Send + Sync>>,
    text: OnceLock<String>,
    short_text: OnceLock<String>,
}

impl DiscrepancyObject {
    pub fn new(node: Arc<RefNode>) -> Self {
        Self {
            node,
            fix_anchor: None,
            fixed: AtomicBool::new(false),
            payload: None,
            text: OnceLock::new(),
            short_text: OnceLock::new(),
        }
    }

    /// Mark this object fixable, anchored at the given node.
    pub fn with_fix_anchor(mut self, anchor: Arc<RefNode>) -> Self {
        self.fix_anchor = Some(anchor);
        self
    }

    /// Attach per-test auxiliary data for the fix callback.
    pub fn with_payload<T: Any + Send + Sync>(mut self, payload: T) -> Self {
        self.payload = Some(Box::new(payload));
        self
    }

    pub fn node(&self) -> &Arc<RefNode> {
        &self.node
    }

    pub fn fix_anchor(&self) -> Option<&Arc<RefNode>> {
        self.fix_anchor.as_ref()
    }

    pub fn has_fix_anchor(&self) -> bool {
        self.fix_anchor.is_some()
    }

    /// Fixable now: an anchor exists and no fix has been applied yet.
    /// Once fixed, an object never qualifies again.
    pub fn can_autofix(&self) -> bool {
        self.fix_anchor.is_some() && !self.is_fixed()
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed.load(Ordering::Relaxed)
    }

    /// Record that a fix was positively applied.
    pub fn mark_fixed(&self) {
        self.fixed.store(true, Ordering::Relaxed);
    }

    /// Downcast the auxiliary payload.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }

    /// Full path label, computed once.
    pub fn text(&self) -> &str {
        self.text.get_or_init(|| self.node.path_label())
    }

    /// Short node label, computed once.
    pub fn short_text(&self) -> &str {
        self.short_text.get_or_init(|| self.node.label())
    }
}

impl fmt::Debug for DiscrepancyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscrepancyObject")
            .field("node", &self.node.label())
            .field("fix_anchor", &self.fix_anchor.as_ref().map(|a| a.label()))
            .field("fixed", &self.is_fixed())
            .finish()
    }
}

impl fmt::Display for DiscrepancyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

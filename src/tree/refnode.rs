//! Positional identity for document nodes.
//!
//! A [`RefNode`] names one position in the logical document tree by its kind
//! and its index among same-kind siblings, chained to the root through shared
//! parent references. Report objects embed RefNodes so that a node can be
//! found again after the live decoded tree is long gone: the same document,
//! decoded independently twice, produces identical (kind, index) chains for
//! the same logical node, and that chain — never pointer identity — is what
//! the autofix replay matches on.

use std::fmt;
use std::sync::{Arc, OnceLock};

/// Kind tag of a document tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    None,
    /// Root node for one input file.
    File,
    /// A `Seq-submit` wrapper.
    Submit,
    SubmitBlock,
    /// A Bioseq-set of any class.
    SeqSet,
    Bioseq,
    SeqFeat,
    SeqDesc,
    /// Free-text content.
    Text,
}

impl NodeKind {
    /// Ordering rank used by the autofix path sort: at a tie in sibling
    /// index, features come before descriptors, descriptors before the rest.
    pub fn rank(self) -> u8 {
        match self {
            NodeKind::SeqFeat => 0,
            NodeKind::SeqDesc => 1,
            _ => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::None => "none",
            NodeKind::File => "file",
            NodeKind::Submit => "submit",
            NodeKind::SubmitBlock => "submit-block",
            NodeKind::SeqSet => "set",
            NodeKind::Bioseq => "sequence",
            NodeKind::SeqFeat => "feature",
            NodeKind::SeqDesc => "descriptor",
            NodeKind::Text => "text",
        }
    }
}

/// Immutable-after-creation identity token for one document position.
///
/// The only mutation ever applied is the one-time fill of the lazily
/// computed display label.
#[derive(Debug)]
pub struct RefNode {
    kind: NodeKind,
    index: u32,
    parent: Option<Arc<RefNode>>,
    label: OnceLock<String>,
}

impl RefNode {
    /// Create a root node (no parent).
    pub fn root(kind: NodeKind, index: u32) -> Arc<Self> {
        Arc::new(Self {
            kind,
            index,
            parent: None,
            label: OnceLock::new(),
        })
    }

    /// Create a child of `parent` with the given sibling index.
    pub fn child(parent: &Arc<RefNode>, kind: NodeKind, index: u32) -> Arc<Self> {
        Arc::new(Self {
            kind,
            index,
            parent: Some(Arc::clone(parent)),
            label: OnceLock::new(),
        })
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn parent(&self) -> Option<&Arc<RefNode>> {
        self.parent.as_ref()
    }

    /// Fill the display label. Later calls are ignored; the first writer
    /// wins, which keeps labels stable across re-decodes.
    pub fn set_label(&self, label: impl Into<String>) {
        let _ = self.label.set(label.into());
    }

    /// The display label, or a positional fallback when none was computed.
    pub fn label(&self) -> String {
        match self.label.get() {
            Some(s) => s.clone(),
            None => format!("{} {}", self.kind.as_str(), self.index + 1),
        }
    }

    /// The structural path from the root to this node.
    pub fn path(&self) -> NodePath {
        let mut elements = Vec::new();
        let mut cur = Some(self);
        while let Some(node) = cur {
            elements.push((node.kind, node.index));
            cur = node.parent.as_deref();
        }
        elements.reverse();
        NodePath(elements)
    }

    /// True when `self` and `other` denote the same document position.
    ///
    /// Positional, not pointer-based: the two nodes may come from entirely
    /// separate decode passes.
    pub fn same_position(&self, other: &RefNode) -> bool {
        if self.kind != other.kind || self.index != other.index {
            return false;
        }
        match (&self.parent, &other.parent) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same_position(b),
            _ => false,
        }
    }

    /// Labels joined from the root down, for report rows.
    pub fn path_label(&self) -> String {
        let mut labels = Vec::new();
        let mut cur = Some(self);
        while let Some(node) = cur {
            labels.push(node.label());
            cur = node.parent.as_deref();
        }
        labels.reverse();
        labels.join(" / ")
    }
}

impl fmt::Display for RefNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// An explicit path value: ordered (kind, index) pairs from the root.
///
/// Equality is structural. The ordering is depth-first document order with
/// the feature/descriptor rank as tie-break, which is exactly the order the
/// autofix pass applies fixes in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath(pub Vec<(NodeKind, u32)>);

impl NodePath {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the top-level record under the file root, if this path
    /// reaches below one.
    pub fn record_index(&self) -> Option<u32> {
        match self.0.first() {
            Some((NodeKind::File, _)) => self.0.get(1).map(|(_, i)| *i),
            _ => self.0.first().map(|(_, i)| *i),
        }
    }

    /// Index of the file root, when present.
    pub fn file_index(&self) -> Option<u32> {
        match self.0.first() {
            Some((NodeKind::File, i)) => Some(*i),
            _ => None,
        }
    }
}

impl Ord for NodePath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            let step = a.1.cmp(&b.1).then(a.0.rank().cmp(&b.0.rank()));
            if step != Ordering::Equal {
                return step;
            }
        }
        // an ancestor precedes its descendants
        self.0.len().cmp(&other.0.len())
    }
}

impl PartialOrd for NodePath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

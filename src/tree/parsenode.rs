//! Live per-node working state for the streamed document tree.
//!
//! A [`ParseNode`] pairs the decoded object data with its [`RefNode`]
//! identity and the per-node indices the dispatch engine reads: descriptor
//! and feature lists (each entry carrying its own RefNode), biosource and
//! publication positions, and the author-to-publication map. Heavy data is
//! released once a subtree has been extended and tested, unless the node is
//! flagged kept; the RefNode chain survives inside report objects.

use std::collections::HashMap;
use std::sync::Arc;

use crate::asn::{
    BioSource, Bioseq, MolInfo, Pubdesc, SeqAnnot, SeqDesc, SeqEntry, SeqFeat, SeqSubmit,
    SetClass, SetMember, SubmitBlock, TopLevel,
};

use super::refnode::{NodeKind, RefNode};

/// Decoded payload of a parse node.
#[derive(Debug, Clone)]
pub enum NodeData {
    File,
    Submit,
    SubmitBlock(SubmitBlock),
    Set {
        class: SetClass,
        descr: Vec<SeqDesc>,
        annot: Vec<SeqAnnot>,
    },
    Seq(Bioseq),
    /// Heavy data dropped after testing; only the identity remains useful.
    Released,
}

/// A descriptor together with its positional identity.
#[derive(Debug, Clone)]
pub struct DescIndex {
    pub desc: SeqDesc,
    pub node: Arc<RefNode>,
}

/// A feature together with its positional identity.
#[derive(Debug, Clone)]
pub struct FeatIndex {
    pub feat: SeqFeat,
    pub node: Arc<RefNode>,
}

/// Facts inherited from the nearest ancestor that defines them.
#[derive(Debug, Clone, Default)]
pub struct Inherited {
    pub title: Option<String>,
    pub molinfo: Option<MolInfo>,
    pub biosource: Option<BioSource>,
}

/// Per-parent sibling counters, one per node kind.
///
/// Indices must be exactly reproducible across independent decodes of the
/// same document; counting per (parent, kind) in structural order is the
/// whole contract.
#[derive(Debug, Default)]
pub struct KindCounter(HashMap<NodeKind, u32>);

impl KindCounter {
    pub fn next(&mut self, kind: NodeKind) -> u32 {
        let slot = self.0.entry(kind).or_insert(0);
        let index = *slot;
        *slot += 1;
        index
    }
}

/// The live, heavyweight working state for one document node.
#[derive(Debug)]
pub struct ParseNode {
    pub node: Arc<RefNode>,
    pub data: NodeData,
    pub children: Vec<ParseNode>,
    /// Byte offset to decode from during the extend pass.
    pub deferred: Option<u64>,
    /// Set once a deferred node has been decoded a second time.
    pub repeat: bool,
    /// Kept nodes survive release (top-level roots, biological units).
    pub keep: bool,
    pub descs: Vec<DescIndex>,
    pub feats: Vec<FeatIndex>,
    /// Positions in `descs` holding a BioSource.
    pub biosources: Vec<usize>,
    /// Positions in `descs` holding a publication.
    pub pubs: Vec<usize>,
    /// Author name to positions in `descs` of the publications naming them.
    pub authors: HashMap<String, Vec<usize>>,
    pub inherited: Inherited,
}

impl ParseNode {
    fn new(node: Arc<RefNode>, data: NodeData) -> Self {
        Self {
            node,
            data,
            children: Vec::new(),
            deferred: None,
            repeat: false,
            keep: false,
            descs: Vec::new(),
            feats: Vec::new(),
            biosources: Vec::new(),
            pubs: Vec::new(),
            authors: HashMap::new(),
            inherited: Inherited::default(),
        }
    }

    /// Build the node tree for a decoded top-level record.
    pub fn from_top_level(
        top: TopLevel,
        file_node: &Arc<RefNode>,
        counter: &mut KindCounter,
    ) -> ParseNode {
        match top {
            TopLevel::Submit(submit) => Self::from_submit(submit, file_node, counter),
            TopLevel::Entry(entry) => Self::from_entry(entry, file_node, counter),
        }
    }

    fn from_submit(
        submit: SeqSubmit,
        parent: &Arc<RefNode>,
        counter: &mut KindCounter,
    ) -> ParseNode {
        let index = counter.next(NodeKind::Submit);
        let ref_node = RefNode::child(parent, NodeKind::Submit, index);
        ref_node.set_label("Seq-submit");
        let mut node = ParseNode::new(ref_node, NodeData::Submit);

        let mut child_counter = KindCounter::default();
        let block_index = child_counter.next(NodeKind::SubmitBlock);
        let block_ref = RefNode::child(&node.node, NodeKind::SubmitBlock, block_index);
        block_ref.set_label("submit-block");
        node.children
            .push(ParseNode::new(block_ref, NodeData::SubmitBlock(submit.block)));

        for entry in submit.entries {
            let child = Self::from_entry(entry, &node.node, &mut child_counter);
            node.children.push(child);
        }
        node
    }

    /// Build the node tree for one entry; set members are recursed, deferred
    /// members become placeholder children with only the offset recorded.
    pub fn from_entry(
        entry: SeqEntry,
        parent: &Arc<RefNode>,
        counter: &mut KindCounter,
    ) -> ParseNode {
        match entry {
            SeqEntry::Seq(seq) => {
                let index = counter.next(NodeKind::Bioseq);
                let ref_node = RefNode::child(parent, NodeKind::Bioseq, index);
                ref_node.set_label(seq.id.clone());
                ParseNode::new(ref_node, NodeData::Seq(seq))
            }
            SeqEntry::Set(set) => {
                let index = counter.next(NodeKind::SeqSet);
                let ref_node = RefNode::child(parent, NodeKind::SeqSet, index);
                ref_node.set_label(format!("{} set", set.class.as_token()));
                let mut node = ParseNode::new(
                    ref_node,
                    NodeData::Set {
                        class: set.class,
                        descr: set.descr,
                        annot: set.annot,
                    },
                );
                let mut child_counter = KindCounter::default();
                for member in set.seq_set {
                    match member {
                        SetMember::Entry(child) => {
                            node.children
                                .push(Self::from_entry(child, &node.node, &mut child_counter));
                        }
                        SetMember::Deferred { offset, class } => {
                            let child_index = child_counter.next(NodeKind::SeqSet);
                            let child_ref =
                                RefNode::child(&node.node, NodeKind::SeqSet, child_index);
                            child_ref.set_label(format!("{} set", class.as_token()));
                            let mut child = ParseNode::new(
                                child_ref,
                                NodeData::Set {
                                    class,
                                    descr: Vec::new(),
                                    annot: Vec::new(),
                                },
                            );
                            child.deferred = Some(offset);
                            node.children.push(child);
                        }
                    }
                }
                node
            }
        }
    }

    /// Fill this deferred node from its freshly re-decoded entry.
    ///
    /// The node keeps its original RefNode — the whole point of deferral is
    /// that the identity was assigned before the data existed.
    pub fn fill_deferred(&mut self, entry: SeqEntry) {
        debug_assert!(self.deferred.is_some());
        self.deferred = None;
        self.repeat = true;
        match entry {
            SeqEntry::Set(set) => {
                self.data = NodeData::Set {
                    class: set.class,
                    descr: set.descr,
                    annot: set.annot,
                };
                let mut child_counter = KindCounter::default();
                for member in set.seq_set {
                    match member {
                        SetMember::Entry(child) => {
                            self.children
                                .push(Self::from_entry(child, &self.node, &mut child_counter));
                        }
                        SetMember::Deferred { offset, class } => {
                            let child_index = child_counter.next(NodeKind::SeqSet);
                            let child_ref =
                                RefNode::child(&self.node, NodeKind::SeqSet, child_index);
                            child_ref.set_label(format!("{} set", class.as_token()));
                            let mut child = ParseNode::new(
                                child_ref,
                                NodeData::Set {
                                    class,
                                    descr: Vec::new(),
                                    annot: Vec::new(),
                                },
                            );
                            child.deferred = Some(offset);
                            self.children.push(child);
                        }
                    }
                }
            }
            SeqEntry::Seq(seq) => {
                // a deferred member is always a set; tolerate anyway
                self.data = NodeData::Seq(seq);
            }
        }
    }

    /// The set class, when this node is a set.
    pub fn set_class(&self) -> Option<SetClass> {
        match &self.data {
            NodeData::Set { class, .. } => Some(*class),
            _ => None,
        }
    }

    /// The decoded sequence, when this node is a Bioseq.
    pub fn bioseq(&self) -> Option<&Bioseq> {
        match &self.data {
            NodeData::Seq(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn submit_block(&self) -> Option<&SubmitBlock> {
        match &self.data {
            NodeData::SubmitBlock(block) => Some(block),
            _ => None,
        }
    }

    /// Populate descriptor/feature indices and the derived author map from
    /// the decoded data, assigning child RefNodes in structural order.
    pub fn populate_indices(&mut self) {
        let (descr, annot): (&[SeqDesc], &[SeqAnnot]) = match &self.data {
            NodeData::Seq(seq) => (&seq.descr, &seq.annot),
            NodeData::Set { descr, annot, .. } => (descr, annot),
            _ => return,
        };

        let mut counter = KindCounter::default();
        let mut descs = Vec::with_capacity(descr.len());
        for desc in descr {
            let index = counter.next(NodeKind::SeqDesc);
            let ref_node = RefNode::child(&self.node, NodeKind::SeqDesc, index);
            ref_node.set_label(desc_label(desc));
            descs.push(DescIndex {
                desc: desc.clone(),
                node: ref_node,
            });
        }

        let mut feats = Vec::new();
        for annot in annot {
            for feat in &annot.ftable {
                let index = counter.next(NodeKind::SeqFeat);
                let ref_node = RefNode::child(&self.node, NodeKind::SeqFeat, index);
                ref_node.set_label(format!("{} {}", feat.kind.as_token(), feat.location));
                feats.push(FeatIndex {
                    feat: feat.clone(),
                    node: ref_node,
                });
            }
        }

        self.biosources = descs
            .iter()
            .enumerate()
            .filter(|(_, d)| matches!(d.desc, SeqDesc::Source(_)))
            .map(|(i, _)| i)
            .collect();
        self.pubs = descs
            .iter()
            .enumerate()
            .filter(|(_, d)| matches!(d.desc, SeqDesc::Pub(_)))
            .map(|(i, _)| i)
            .collect();

        let mut authors: HashMap<String, Vec<usize>> = HashMap::new();
        for &pub_idx in &self.pubs {
            if let SeqDesc::Pub(pubdesc) = &descs[pub_idx].desc {
                for author in &pubdesc.authors {
                    authors.entry(author.clone()).or_default().push(pub_idx);
                }
            }
        }

        self.descs = descs;
        self.feats = feats;
        self.authors = authors;
    }

    /// Compute the inherited title/molinfo/biosource: start from the parent
    /// view, override with this node's own descriptors.
    pub fn compute_inherited(&mut self, parent: Option<&Inherited>) {
        let mut inherited = parent.cloned().unwrap_or_default();
        for entry in &self.descs {
            match &entry.desc {
                SeqDesc::Title(t) => inherited.title = Some(t.clone()),
                SeqDesc::MolInfo(m) => inherited.molinfo = Some(m.clone()),
                SeqDesc::Source(s) => inherited.biosource = Some(s.clone()),
                _ => {}
            }
        }
        self.inherited = inherited;
    }

    /// Publications among this node's descriptors.
    pub fn pubdescs(&self) -> impl Iterator<Item = (&Pubdesc, &DescIndex)> {
        self.pubs.iter().filter_map(|&i| {
            let entry = &self.descs[i];
            entry.desc.as_pub().map(|p| (p, entry))
        })
    }

    /// Drop decoded data and children, keeping only identity.
    pub fn release(&mut self) {
        self.data = NodeData::Released;
        self.children.clear();
        self.descs.clear();
        self.feats.clear();
        self.biosources.clear();
        self.pubs.clear();
        self.authors.clear();
    }

    pub fn is_released(&self) -> bool {
        matches!(self.data, NodeData::Released)
    }
}

fn desc_label(desc: &SeqDesc) -> String {
    fn brief(s: &str) -> String {
        if s.len() > 40 {
            format!("{}...", &s[..37])
        } else {
            s.to_string()
        }
    }
    match desc {
        SeqDesc::Title(t) => format!("title: {}", brief(t)),
        SeqDesc::Comment(c) => format!("comment: {}", brief(c)),
        SeqDesc::User(_) => "user object".to_string(),
        SeqDesc::MolInfo(m) => format!("molinfo: {}", m.biomol),
        SeqDesc::Source(s) => format!("source: {}", s.org.taxname),
        SeqDesc::Pub(p) => format!("pub: {}", brief(&p.title)),
    }
}

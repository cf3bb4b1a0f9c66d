//! Cross-feature resolution scope for one biological unit.
//!
//! Built when the traversal enters a nuc-prot set, a gen-prod set, or a
//! standalone Bioseq, and torn down when that unit completes; callers must
//! not hold feature references past the reset. Resolution is by genomic
//! containment and overlap on the same sequence id.

use crate::asn::{FeatKind, SeqFeat};
use crate::tree::{NodeData, ParseNode};

/// Gene/mRNA resolution consumed by test bodies as a black box.
pub trait FeatureResolver {
    /// The gene governing a feature: the smallest gene whose location
    /// contains it, else the smallest overlapping gene.
    fn gene_for_feature(&self, feat: &SeqFeat) -> Option<&SeqFeat>;

    /// The best mRNA for a coding region, by the same containment rule.
    fn best_mrna_for_cds(&self, cds: &SeqFeat) -> Option<&SeqFeat>;
}

/// Per-unit feature index.
#[derive(Debug, Default)]
pub struct UnitScope {
    feats: Vec<SeqFeat>,
}

impl UnitScope {
    /// Collect every feature in the unit's decoded subtree.
    ///
    /// The subtree must be fully decoded; deferral never applies inside a
    /// biological unit, which is what keeps this collection complete.
    pub fn build(root: &ParseNode) -> Self {
        let mut feats = Vec::new();
        collect(root, &mut feats);
        Self { feats }
    }

    pub fn features(&self) -> &[SeqFeat] {
        &self.feats
    }

    pub fn is_empty(&self) -> bool {
        self.feats.is_empty()
    }

    /// Drop all indices; the unit is done.
    pub fn clear(&mut self) {
        self.feats.clear();
    }

    fn best_container(&self, kind: FeatKind, target: &SeqFeat) -> Option<&SeqFeat> {
        let mut best: Option<&SeqFeat> = None;
        for feat in self.feats.iter().filter(|f| f.kind == kind) {
            let fits = feat.location.contains(&target.location)
                || feat.location.overlaps(&target.location);
            if !fits {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    // containment beats overlap; smaller beats larger
                    let b_contains = b.location.contains(&target.location);
                    let f_contains = feat.location.contains(&target.location);
                    match (f_contains, b_contains) {
                        (true, false) => true,
                        (false, true) => false,
                        _ => feat.location.len() < b.location.len(),
                    }
                }
            };
            if better {
                best = Some(feat);
            }
        }
        best
    }
}

impl FeatureResolver for UnitScope {
    fn gene_for_feature(&self, feat: &SeqFeat) -> Option<&SeqFeat> {
        self.best_container(FeatKind::Gene, feat)
    }

    fn best_mrna_for_cds(&self, cds: &SeqFeat) -> Option<&SeqFeat> {
        self.best_container(FeatKind::Mrna, cds)
    }
}

fn collect(node: &ParseNode, out: &mut Vec<SeqFeat>) {
    match &node.data {
        NodeData::Seq(seq) => out.extend(seq.features().cloned()),
        NodeData::Set { annot, .. } => {
            out.extend(annot.iter().flat_map(|a| a.ftable.iter()).cloned());
        }
        _ => {}
    }
    for child in &node.children {
        collect(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn::{Bioseq, MolType, SeqAnnot, SeqEntry, SeqInst, SeqLoc, Strand};
    use crate::tree::{KindCounter, NodeKind, ParseNode, RefNode};

    fn feat(kind: FeatKind, from: usize, to: usize) -> SeqFeat {
        SeqFeat {
            kind,
            location: SeqLoc {
                id: "nuc1".to_string(),
                from,
                to,
                strand: Strand::Plus,
            },
            product: None,
            comment: None,
            quals: Vec::new(),
        }
    }

    fn scope_of(feats: Vec<SeqFeat>) -> UnitScope {
        let seq = Bioseq {
            id: "nuc1".to_string(),
            inst: SeqInst {
                mol: MolType::Dna,
                length: 100,
                data: None,
            },
            descr: Vec::new(),
            annot: vec![SeqAnnot { ftable: feats }],
        };
        let root = RefNode::root(NodeKind::File, 0);
        let mut counter = KindCounter::default();
        let node = ParseNode::from_entry(SeqEntry::Seq(seq), &root, &mut counter);
        UnitScope::build(&node)
    }

    #[test]
    fn test_gene_for_feature_prefers_smallest_container() {
        let scope = scope_of(vec![
            feat(FeatKind::Gene, 0, 99),
            feat(FeatKind::Gene, 10, 40),
            feat(FeatKind::Cdregion, 15, 30),
        ]);
        let cds = feat(FeatKind::Cdregion, 15, 30);
        let gene = scope.gene_for_feature(&cds).expect("gene expected");
        assert_eq!(gene.location.from, 10);
        assert_eq!(gene.location.to, 40);
    }

    #[test]
    fn test_containment_beats_overlap() {
        let scope = scope_of(vec![
            feat(FeatKind::Gene, 18, 20), // overlaps only, smaller
            feat(FeatKind::Gene, 10, 40), // contains
            feat(FeatKind::Cdregion, 15, 30),
        ]);
        let cds = feat(FeatKind::Cdregion, 15, 30);
        let gene = scope.gene_for_feature(&cds).expect("gene expected");
        assert_eq!((gene.location.from, gene.location.to), (10, 40));
    }

    #[test]
    fn test_no_gene_on_other_sequence() {
        let mut other = feat(FeatKind::Gene, 0, 99);
        other.location.id = "other".to_string();
        let scope = scope_of(vec![other]);
        let cds = feat(FeatKind::Cdregion, 15, 30);
        assert!(scope.gene_for_feature(&cds).is_none());
    }

    #[test]
    fn test_best_mrna_for_cds() {
        let scope = scope_of(vec![
            feat(FeatKind::Mrna, 10, 50),
            feat(FeatKind::Mrna, 0, 99),
        ]);
        let cds = feat(FeatKind::Cdregion, 20, 40);
        let mrna = scope.best_mrna_for_cds(&cds).expect("mRNA expected");
        assert_eq!((mrna.location.from, mrna.location.to), (10, 50));
    }

    #[test]
    fn test_clear_empties_scope() {
        let mut scope = scope_of(vec![feat(FeatKind::Gene, 0, 10)]);
        assert!(!scope.is_empty());
        scope.clear();
        assert!(scope.is_empty());
    }
}

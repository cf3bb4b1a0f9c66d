//! Typed subset of the NCBI Bioseq-set data model.
//!
//! The discrepancy engine does not need the full ASN.1 object model, only the
//! slice it walks and mutates: sequences, sets, features, descriptors,
//! organism sources, publications, and the submission block. Values are built
//! by the streaming parser in [`parser`] and written back out by [`writer`].
//!
//! A [`BioseqSet`] member may be left undecoded as [`SetMember::Deferred`]
//! when the parser runs in big-file mode; the recorded byte offset lets the
//! traversal seek back and extend the member later.

pub mod parser;
pub mod writer;

pub use parser::{open_input, AsnReader};
pub use writer::write_top_level;

use serde::{Deserialize, Serialize};

/// Class of a Bioseq-set grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetClass {
    NucProt,
    GenProd,
    SegSet,
    PopSet,
    PhySet,
    EcoSet,
    MutSet,
    SmallGenome,
    Genbank,
    Other,
}

impl SetClass {
    /// A biological-unit grouping: one nucleotide plus its products.
    ///
    /// These subtrees are never skipped in big-file mode because the
    /// cross-feature resolution scope must see them whole.
    pub fn is_biological_unit(self) -> bool {
        matches!(self, SetClass::NucProt | SetClass::GenProd)
    }

    /// One of the eco/mut/phy/pop grouping classes.
    pub fn is_population_style(self) -> bool {
        matches!(
            self,
            SetClass::PopSet | SetClass::PhySet | SetClass::EcoSet | SetClass::MutSet
        )
    }

    /// The token used in the text notation.
    pub fn as_token(self) -> &'static str {
        match self {
            SetClass::NucProt => "nuc-prot",
            SetClass::GenProd => "gen-prod-set",
            SetClass::SegSet => "segset",
            SetClass::PopSet => "pop-set",
            SetClass::PhySet => "phy-set",
            SetClass::EcoSet => "eco-set",
            SetClass::MutSet => "mut-set",
            SetClass::SmallGenome => "small-genome-set",
            SetClass::Genbank => "genbank",
            SetClass::Other => "other",
        }
    }

    /// Parse a class token; unknown tokens map to `Other`.
    pub fn from_token(token: &str) -> Self {
        match token {
            "nuc-prot" => SetClass::NucProt,
            "gen-prod-set" => SetClass::GenProd,
            "segset" => SetClass::SegSet,
            "pop-set" => SetClass::PopSet,
            "phy-set" => SetClass::PhySet,
            "eco-set" => SetClass::EcoSet,
            "mut-set" => SetClass::MutSet,
            "small-genome-set" => SetClass::SmallGenome,
            "genbank" => SetClass::Genbank,
            _ => SetClass::Other,
        }
    }
}

/// Molecule type of a sequence instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MolType {
    Dna,
    Rna,
    Aa,
}

impl MolType {
    pub fn is_na(self) -> bool {
        matches!(self, MolType::Dna | MolType::Rna)
    }

    pub fn as_token(self) -> &'static str {
        match self {
            MolType::Dna => "dna",
            MolType::Rna => "rna",
            MolType::Aa => "aa",
        }
    }
}

/// Sequence instance: molecule class, length, and optional residue data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeqInst {
    pub mol: MolType,
    pub length: usize,
    /// IUPAC residues; absent for far-pointer or virtual sequences.
    pub data: Option<String>,
}

/// A single biological sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bioseq {
    pub id: String,
    pub inst: SeqInst,
    pub descr: Vec<SeqDesc>,
    pub annot: Vec<SeqAnnot>,
}

impl Bioseq {
    /// All features across all annotations, in document order.
    pub fn features(&self) -> impl Iterator<Item = &SeqFeat> {
        self.annot.iter().flat_map(|a| a.ftable.iter())
    }
}

/// A feature table attached to a sequence or set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeqAnnot {
    pub ftable: Vec<SeqFeat>,
}

/// Strand of a location interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Strand {
    #[default]
    Unknown,
    Plus,
    Minus,
}

impl Strand {
    pub fn as_token(self) -> &'static str {
        match self {
            Strand::Unknown => "unknown",
            Strand::Plus => "plus",
            Strand::Minus => "minus",
        }
    }
}

/// A simple interval location on a named sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeqLoc {
    pub id: String,
    /// 0-based inclusive start.
    pub from: usize,
    /// 0-based inclusive stop.
    pub to: usize,
    pub strand: Strand,
}

impl SeqLoc {
    /// True when both locations sit on the same sequence and share at least
    /// one base.
    pub fn overlaps(&self, other: &SeqLoc) -> bool {
        self.id == other.id && self.from <= other.to && other.from <= self.to
    }

    /// True when `other` lies entirely within this interval.
    pub fn contains(&self, other: &SeqLoc) -> bool {
        self.id == other.id && self.from <= other.from && other.to <= self.to
    }

    pub fn len(&self) -> usize {
        self.to.saturating_sub(self.from) + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl std::fmt::Display for SeqLoc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 1-based in user-facing text, like the flat-file view
        write!(f, "{}:{}-{}", self.id, self.from + 1, self.to + 1)?;
        if self.strand == Strand::Minus {
            write!(f, " (minus)")?;
        }
        Ok(())
    }
}

/// Feature data choice, reduced to the subtypes the engine dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatKind {
    Gene,
    Cdregion,
    Mrna,
    Trna,
    Rrna,
    MiscFeature,
    Other,
}

impl FeatKind {
    pub fn as_token(self) -> &'static str {
        match self {
            FeatKind::Gene => "gene",
            FeatKind::Cdregion => "cdregion",
            FeatKind::Mrna => "mrna",
            FeatKind::Trna => "trna",
            FeatKind::Rrna => "rrna",
            FeatKind::MiscFeature => "misc-feature",
            FeatKind::Other => "other",
        }
    }

    pub fn from_token(token: &str) -> Self {
        match token {
            "gene" => FeatKind::Gene,
            "cdregion" => FeatKind::Cdregion,
            "mrna" => FeatKind::Mrna,
            "trna" => FeatKind::Trna,
            "rrna" => FeatKind::Rrna,
            "misc-feature" => FeatKind::MiscFeature,
            _ => FeatKind::Other,
        }
    }
}

/// A single sequence feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeqFeat {
    pub kind: FeatKind,
    pub location: SeqLoc,
    pub product: Option<String>,
    pub comment: Option<String>,
    /// Generic qualifier key/value pairs (`/locus_tag`, `/country`, ...).
    pub quals: Vec<(String, String)>,
}

impl SeqFeat {
    /// First value of the named qualifier, if present.
    pub fn qual(&self, name: &str) -> Option<&str> {
        self.quals
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Mutable access to the first value of the named qualifier.
    pub fn qual_mut(&mut self, name: &str) -> Option<&mut String> {
        self.quals
            .iter_mut()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }
}

/// Genome/organelle location of a biosource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Genome {
    #[default]
    Unknown,
    Genomic,
    Chloroplast,
    Mitochondrion,
    Plasmid,
    Proviral,
}

impl Genome {
    /// True for organellar locations.
    pub fn is_organelle(self) -> bool {
        matches!(self, Genome::Chloroplast | Genome::Mitochondrion)
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Genome::Unknown => "unknown",
            Genome::Genomic => "genomic",
            Genome::Chloroplast => "chloroplast",
            Genome::Mitochondrion => "mitochondrion",
            Genome::Plasmid => "plasmid",
            Genome::Proviral => "proviral",
        }
    }

    pub fn from_token(token: &str) -> Self {
        match token {
            "genomic" => Genome::Genomic,
            "chloroplast" => Genome::Chloroplast,
            "mitochondrion" => Genome::Mitochondrion,
            "plasmid" => Genome::Plasmid,
            "proviral" => Genome::Proviral,
            _ => Genome::Unknown,
        }
    }
}

/// An organism modifier (strain, isolate, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgMod {
    pub subtype: String,
    pub subname: String,
}

/// A specimen-provenance qualifier (country, map, chromosome, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubSource {
    pub subtype: String,
    pub name: String,
}

/// Organism identity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrgRef {
    pub taxname: String,
    pub lineage: Option<String>,
    pub orgmod: Vec<OrgMod>,
}

impl OrgRef {
    /// First value of the named organism modifier.
    pub fn orgmod(&self, subtype: &str) -> Option<&str> {
        self.orgmod
            .iter()
            .find(|m| m.subtype == subtype)
            .map(|m| m.subname.as_str())
    }
}

/// Structured organism-identity and provenance block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BioSource {
    pub genome: Genome,
    pub org: OrgRef,
    pub subtype: Vec<SubSource>,
}

impl BioSource {
    /// First value of the named subsource qualifier.
    pub fn subsource(&self, subtype: &str) -> Option<&str> {
        self.subtype
            .iter()
            .find(|s| s.subtype == subtype)
            .map(|s| s.name.as_str())
    }

    /// Mutable access to the first subsource of the given subtype.
    pub fn subsource_mut(&mut self, subtype: &str) -> Option<&mut SubSource> {
        self.subtype.iter_mut().find(|s| s.subtype == subtype)
    }

    pub fn has_subsource(&self, subtype: &str) -> bool {
        self.subsource(subtype).is_some()
    }
}

/// Molecule-level metadata descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MolInfo {
    pub biomol: String,
    pub completeness: Option<String>,
}

/// A publication descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pubdesc {
    pub title: String,
    pub authors: Vec<String>,
}

/// A sequence descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SeqDesc {
    Title(String),
    MolInfo(MolInfo),
    Source(BioSource),
    Pub(Pubdesc),
    Comment(String),
    User(String),
}

impl SeqDesc {
    pub fn as_source(&self) -> Option<&BioSource> {
        match self {
            SeqDesc::Source(src) => Some(src),
            _ => None,
        }
    }

    pub fn as_source_mut(&mut self) -> Option<&mut BioSource> {
        match self {
            SeqDesc::Source(src) => Some(src),
            _ => None,
        }
    }

    pub fn as_title(&self) -> Option<&str> {
        match self {
            SeqDesc::Title(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_pub(&self) -> Option<&Pubdesc> {
        match self {
            SeqDesc::Pub(p) => Some(p),
            _ => None,
        }
    }

    /// Short tag used in node labels.
    pub fn tag(&self) -> &'static str {
        match self {
            SeqDesc::Title(_) => "title",
            SeqDesc::MolInfo(_) => "molinfo",
            SeqDesc::Source(_) => "source",
            SeqDesc::Pub(_) => "pub",
            SeqDesc::Comment(_) => "comment",
            SeqDesc::User(_) => "user",
        }
    }
}

/// Submission contact information.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub email: Option<String>,
}

/// The submission block of a Seq-submit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubmitBlock {
    pub contact: Option<ContactInfo>,
    pub authors: Vec<String>,
    pub tool: Option<String>,
}

/// One member of a set's `seq-set` list.
///
/// `Deferred` records where a skipped subtree starts so the traversal can
/// seek back and decode it during the extend pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SetMember {
    Entry(SeqEntry),
    Deferred { offset: u64, class: SetClass },
}

/// A grouping of sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BioseqSet {
    pub class: SetClass,
    pub descr: Vec<SeqDesc>,
    pub annot: Vec<SeqAnnot>,
    pub seq_set: Vec<SetMember>,
}

/// Either a single sequence or a grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SeqEntry {
    Seq(Bioseq),
    Set(BioseqSet),
}

impl SeqEntry {
    pub fn as_seq(&self) -> Option<&Bioseq> {
        match self {
            SeqEntry::Seq(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&BioseqSet> {
        match self {
            SeqEntry::Set(set) => Some(set),
            _ => None,
        }
    }

    /// Every feature anywhere in this entry, in document order.
    ///
    /// Deferred members contribute nothing; callers that need completeness
    /// must extend the tree first.
    pub fn all_features(&self) -> Vec<&SeqFeat> {
        let mut out = Vec::new();
        collect_features(self, &mut out);
        out
    }
}

fn collect_features<'a>(entry: &'a SeqEntry, out: &mut Vec<&'a SeqFeat>) {
    match entry {
        SeqEntry::Seq(seq) => out.extend(seq.features()),
        SeqEntry::Set(set) => {
            out.extend(set.annot.iter().flat_map(|a| a.ftable.iter()));
            for member in &set.seq_set {
                if let SetMember::Entry(child) = member {
                    collect_features(child, out);
                }
            }
        }
    }
}

/// A whole submission: block plus entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeqSubmit {
    pub block: SubmitBlock,
    pub entries: Vec<SeqEntry>,
}

/// A decoded top-level record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TopLevel {
    Submit(SeqSubmit),
    Entry(SeqEntry),
}

/// Kind tag of the next top-level record in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopLevelKind {
    /// `Seq-submit ::= { ... }`
    Submit,
    /// `Seq-entry ::= seq|set { ... }`
    Entry,
    /// `Bioseq-set ::= { ... }`
    Set,
    /// `Bioseq ::= { ... }`
    Seq,
}

impl TopLevelKind {
    pub fn header(self) -> &'static str {
        match self {
            TopLevelKind::Submit => "Seq-submit",
            TopLevelKind::Entry => "Seq-entry",
            TopLevelKind::Set => "Bioseq-set",
            TopLevelKind::Seq => "Bioseq",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_class_tokens_round_trip() {
        for class in [
            SetClass::NucProt,
            SetClass::GenProd,
            SetClass::SegSet,
            SetClass::PopSet,
            SetClass::PhySet,
            SetClass::EcoSet,
            SetClass::MutSet,
            SetClass::SmallGenome,
            SetClass::Genbank,
            SetClass::Other,
        ] {
            assert_eq!(SetClass::from_token(class.as_token()), class);
        }
    }

    #[test]
    fn test_biological_unit_classes() {
        assert!(SetClass::NucProt.is_biological_unit());
        assert!(SetClass::GenProd.is_biological_unit());
        assert!(!SetClass::PopSet.is_biological_unit());
        assert!(!SetClass::Genbank.is_biological_unit());
    }

    #[test]
    fn test_seq_loc_overlaps() {
        let a = SeqLoc {
            id: "seq1".to_string(),
            from: 0,
            to: 10,
            strand: Strand::Plus,
        };
        let b = SeqLoc {
            id: "seq1".to_string(),
            from: 5,
            to: 15,
            strand: Strand::Plus,
        };
        let c = SeqLoc {
            id: "seq1".to_string(),
            from: 11,
            to: 20,
            strand: Strand::Plus,
        };
        let d = SeqLoc {
            id: "seq2".to_string(),
            from: 0,
            to: 10,
            strand: Strand::Plus,
        };
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&d));
    }

    #[test]
    fn test_seq_loc_contains() {
        let outer = SeqLoc {
            id: "seq1".to_string(),
            from: 0,
            to: 100,
            strand: Strand::Plus,
        };
        let inner = SeqLoc {
            id: "seq1".to_string(),
            from: 10,
            to: 20,
            strand: Strand::Plus,
        };
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
    }

    #[test]
    fn test_seq_loc_display_is_one_based() {
        let loc = SeqLoc {
            id: "seq1".to_string(),
            from: 0,
            to: 9,
            strand: Strand::Unknown,
        };
        assert_eq!(loc.to_string(), "seq1:1-10");
    }

    #[test]
    fn test_biosource_subsource_lookup() {
        let src = BioSource {
            genome: Genome::Genomic,
            org: OrgRef::default(),
            subtype: vec![
                SubSource {
                    subtype: "map".to_string(),
                    name: "m1".to_string(),
                },
                SubSource {
                    subtype: "country".to_string(),
                    name: "France".to_string(),
                },
            ],
        };
        assert_eq!(src.subsource("map"), Some("m1"));
        assert_eq!(src.subsource("country"), Some("France"));
        assert!(src.subsource("chromosome").is_none());
        assert!(src.has_subsource("map"));
    }

    #[test]
    fn test_feat_qual_lookup() {
        let feat = SeqFeat {
            kind: FeatKind::Gene,
            location: SeqLoc {
                id: "seq1".to_string(),
                from: 0,
                to: 10,
                strand: Strand::Plus,
            },
            product: None,
            comment: None,
            quals: vec![("locus_tag".to_string(), "ABC_0001".to_string())],
        };
        assert_eq!(feat.qual("locus_tag"), Some("ABC_0001"));
        assert!(feat.qual("country").is_none());
    }

    #[test]
    fn test_all_features_skips_deferred() {
        let feat = SeqFeat {
            kind: FeatKind::Gene,
            location: SeqLoc {
                id: "seq1".to_string(),
                from: 0,
                to: 10,
                strand: Strand::Plus,
            },
            product: None,
            comment: None,
            quals: Vec::new(),
        };
        let entry = SeqEntry::Set(BioseqSet {
            class: SetClass::Genbank,
            descr: Vec::new(),
            annot: vec![SeqAnnot {
                ftable: vec![feat],
            }],
            seq_set: vec![SetMember::Deferred {
                offset: 1234,
                class: SetClass::PopSet,
            }],
        });
        assert_eq!(entry.all_features().len(), 1);
    }
}

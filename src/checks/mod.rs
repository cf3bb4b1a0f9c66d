//! Discrepancy test bodies.
//!
//! Each test is a small state machine over the dispatch callbacks: `visit_*`
//! hooks observe nodes as the traversal completes them and write matches
//! into the test's report tree; `summarize` runs once at end of document for
//! cross-referencing work; `autofix` is the per-object fix callback invoked
//! by the replay engine. Everything here is plumbing over the core API — a
//! body never parses the stream or walks the tree itself.

pub mod biosource;
pub mod feature;
pub mod pubs;
pub mod sequence;
pub mod submit;

use crate::asn::{BioSource, Pubdesc, SubmitBlock};
use crate::autofix::FixTarget;
use crate::context::{NodeView, SummarizeCtx};
use crate::registry::{groups, Partition, TestDescriptor};
use crate::report::{DiscrepancyObject, ReportNode};
use crate::tree::{DescIndex, FeatIndex};

/// A discrepancy test body.
///
/// All hooks default to no-ops so a body only implements the partitions it
/// registered for. The engine guarantees `summarize` runs exactly once per
/// run, after all documents.
pub trait Check: Send {
    fn visit_bioseq(&mut self, _report: &mut ReportNode, _v: &NodeView<'_>) {}
    fn visit_set(&mut self, _report: &mut ReportNode, _v: &NodeView<'_>) {}
    fn visit_feat(&mut self, _report: &mut ReportNode, _feat: &FeatIndex, _v: &NodeView<'_>) {}
    fn visit_desc(&mut self, _report: &mut ReportNode, _desc: &DescIndex, _v: &NodeView<'_>) {}
    fn visit_biosource(
        &mut self,
        _report: &mut ReportNode,
        _src: &BioSource,
        _desc: &DescIndex,
        _v: &NodeView<'_>,
    ) {
    }
    fn visit_pub(
        &mut self,
        _report: &mut ReportNode,
        _pubdesc: &Pubdesc,
        _desc: &DescIndex,
        _v: &NodeView<'_>,
    ) {
    }
    fn visit_author(
        &mut self,
        _report: &mut ReportNode,
        _author: &str,
        _desc: &DescIndex,
        _v: &NodeView<'_>,
    ) {
    }
    fn visit_submit(&mut self, _report: &mut ReportNode, _block: &SubmitBlock, _v: &NodeView<'_>) {
    }
    fn visit_text(&mut self, _report: &mut ReportNode, _text: &str, _v: &NodeView<'_>) {}
    fn summarize(&mut self, _report: &mut ReportNode, _ctx: &SummarizeCtx<'_>) {}

    /// Apply this test's fix to one flagged object. Return `true` only when
    /// a change was positively made; declining is a valid no-op.
    fn autofix(&self, _obj: &DiscrepancyObject, _target: &mut FixTarget<'_>) -> bool {
        false
    }
}

/// The one explicit registration list. Order here is registration order;
/// codes are stable across releases and strictly increasing.
pub static TESTS: &[TestDescriptor] = &[
    TestDescriptor {
        name: "COUNT_NUCLEOTIDES",
        code: 10,
        groups: groups::DEFAULT | groups::SUBMITTER | groups::ONCALLER | groups::BIG,
        description: "Count nucleotide sequences present in the submission",
        aliases: &["NUCLEOTIDE_COUNT"],
        partitions: &[Partition::Bioseq],
        autofix: false,
        factory: || Box::<sequence::CountNucleotides>::default(),
    },
    TestDescriptor {
        name: "DUP_DEFLINE",
        code: 20,
        groups: groups::DEFAULT | groups::ONCALLER,
        description: "Definition lines duplicated across sequences",
        aliases: &["DUPLICATE_DEFLINES"],
        partitions: &[Partition::SeqDesc],
        autofix: false,
        factory: || Box::<sequence::DupDefline>::default(),
    },
    TestDescriptor {
        name: "N_RUNS",
        code: 30,
        groups: groups::DEFAULT | groups::SUBMITTER | groups::BIG,
        description: "Sequences with runs of 10 or more Ns",
        aliases: &[],
        partitions: &[Partition::Bioseq],
        autofix: false,
        factory: || Box::<sequence::NRuns>::default(),
    },
    TestDescriptor {
        name: "PERCENT_N",
        code: 40,
        groups: groups::DEFAULT | groups::SUBMITTER | groups::BIG,
        description: "Sequences with more than 5% Ns",
        aliases: &[],
        partitions: &[Partition::Bioseq],
        autofix: false,
        factory: || Box::<sequence::PercentN>::default(),
    },
    TestDescriptor {
        name: "RNA_CDS_OVERLAP",
        code: 50,
        groups: groups::DEFAULT | groups::SUBMITTER,
        description: "Coding regions overlapping RNA features",
        aliases: &["OVERLAPPING_RNA_CDS"],
        partitions: &[Partition::SeqFeat],
        autofix: false,
        factory: || Box::<feature::RnaCdsOverlap>::default(),
    },
    TestDescriptor {
        name: "BAD_LOCUS_TAG_FORMAT",
        code: 55,
        groups: groups::DEFAULT | groups::SUBMITTER,
        description: "Locus tags not in prefix_suffix format",
        aliases: &[],
        partitions: &[Partition::SeqFeat],
        autofix: false,
        factory: || Box::<feature::BadLocusTagFormat>::default(),
    },
    TestDescriptor {
        name: "MAP_CHROMOSOME_CONFLICT",
        code: 60,
        groups: groups::DEFAULT | groups::ONCALLER,
        description: "Eukaryotic sources with a map but no chromosome",
        aliases: &[],
        partitions: &[Partition::BioSource],
        autofix: false,
        factory: || Box::<biosource::MapChromosomeConflict>::default(),
    },
    TestDescriptor {
        name: "COUNTRY_COLON",
        code: 70,
        groups: groups::DEFAULT | groups::ONCALLER,
        description: "Country qualifiers with trailing colons",
        aliases: &["ONCALLER_COUNTRY_COLON"],
        partitions: &[Partition::BioSource],
        autofix: true,
        factory: || Box::<biosource::CountryColon>::default(),
    },
    TestDescriptor {
        name: "STRAIN_TAXNAME_MISMATCH",
        code: 80,
        groups: groups::DEFAULT | groups::ONCALLER,
        description: "Identical strains attached to differing taxnames",
        aliases: &["STRAIN_TAXNAME_CONFLICT"],
        partitions: &[Partition::BioSource],
        autofix: false,
        factory: || Box::<biosource::StrainTaxnameMismatch>::default(),
    },
    TestDescriptor {
        name: "TITLE_AUTHOR_CONFLICT",
        code: 90,
        groups: groups::DEFAULT | groups::ONCALLER,
        description: "Publications sharing a title with differing author lists",
        aliases: &[],
        partitions: &[Partition::Pubdesc],
        autofix: false,
        factory: || Box::<pubs::TitleAuthorConflict>::default(),
    },
    TestDescriptor {
        name: "SUBMITBLOCK_CONTACT",
        code: 100,
        groups: groups::DEFAULT | groups::SUBMITTER,
        description: "Submission blocks missing a contact e-mail",
        aliases: &["MISSING_CONTACT_EMAIL"],
        partitions: &[Partition::Submit],
        autofix: false,
        factory: || Box::<submit::SubmitBlockContact>::default(),
    },
];

/// Group a list of (key, value) pairs preserving first-seen key order.
/// Summarize hooks use this for cross-referencing collected matches.
pub(crate) fn group_by_key<K: PartialEq + Clone, V>(items: Vec<(K, V)>) -> Vec<(K, Vec<V>)> {
    let mut groups: Vec<(K, Vec<V>)> = Vec::new();
    for (key, value) in items {
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, bucket)) => bucket.push(value),
            None => groups.push((key, vec![value])),
        }
    }
    groups
}

//! End-to-end engine tests over in-memory documents.
//!
//! These drive the full pipeline: streaming decode, tree building, dispatch,
//! and summarize, asserting on the exported report trees.

use std::io::Cursor;
use std::path::Path;

use ferro_disc::asn::AsnReader;
use ferro_disc::checks::Check;
use ferro_disc::context::{DiscrepancyReport, NodeView};
use ferro_disc::registry::{groups, Partition, TestDescriptor};
use ferro_disc::report::ReportNode;
use ferro_disc::{DiscrepancyContext, RunSettings, Severity, TestSelection};

fn context_for(tests: &[&str]) -> DiscrepancyContext {
    DiscrepancyContext::new(RunSettings {
        big_file: false,
        selection: TestSelection {
            include: tests.iter().map(|s| s.to_string()).collect(),
            ..TestSelection::default()
        },
    })
}

fn process(ctx: &mut DiscrepancyContext, text: &str, big_file: bool) {
    let reader = AsnReader::new(Cursor::new(text.as_bytes().to_vec()), "input.sqn")
        .with_big_file(big_file);
    ctx.process_source(reader, false, Path::new("input.sqn"))
        .expect("document must parse");
}

fn test_item<'a>(
    report: &'a DiscrepancyReport,
    name: &str,
) -> Option<&'a ferro_disc::ReportItem> {
    report
        .tests
        .iter()
        .find(|t| t.desc.name == name)
        .map(|t| &t.item)
}

// ============================================================================
// Scenario: overlapping tRNA and coding region in a nuc-prot set
// ============================================================================

const NUC_PROT_OVERLAP: &str = r#"Seq-entry ::= set {
  class nuc-prot,
  seq-set {
    seq {
      id "nuc1",
      inst { mol dna, length 20, seq-data "ACGTACGTACGTACGTACGT" },
      annot {
        ftable {
          { data trna, location { id "nuc1", from 0, to 10, strand plus } },
          { data cdregion, location { id "nuc1", from 5, to 15, strand plus } }
        }
      }
    },
    seq { id "prot1", inst { mol aa, length 5, seq-data "MKLVR" } }
  }
}"#;

#[test]
fn test_rna_cds_overlap_reports_one_bucket_with_both_features() {
    let mut ctx = context_for(&["RNA_CDS_OVERLAP"]);
    process(&mut ctx, NUC_PROT_OVERLAP, false);
    let report = ctx.summarize();
    let item = test_item(&report, "RNA_CDS_OVERLAP").expect("overlap must be reported");
    assert_eq!(item.children.len(), 1);
    let bucket = &item.children[0];
    assert_eq!(bucket.objects.len(), 2);
    assert_eq!(bucket.msg, "1 coding regions overlap RNA features");
}

#[test]
fn test_no_overlap_when_locations_disjoint() {
    let text = NUC_PROT_OVERLAP.replace("from 5, to 15", "from 12, to 18");
    let mut ctx = context_for(&["RNA_CDS_OVERLAP"]);
    process(&mut ctx, &text, false);
    let report = ctx.summarize();
    assert!(test_item(&report, "RNA_CDS_OVERLAP").is_none());
}

// ============================================================================
// Scenario: map subsource without chromosome on a eukaryote
// ============================================================================

const MAP_NO_CHROMOSOME: &str = r#"Seq-entry ::= seq {
  id "seq1",
  inst { mol dna, length 8, seq-data "ACGTACGT" },
  descr {
    source {
      genome genomic,
      org { taxname "Homo sapiens", lineage "Eukaryota; Metazoa" },
      subtype { { subtype map, name "m1" } }
    }
  }
}"#;

#[test]
fn test_map_without_chromosome_is_fatal() {
    let mut ctx = context_for(&["MAP_CHROMOSOME_CONFLICT"]);
    process(&mut ctx, MAP_NO_CHROMOSOME, false);
    let report = ctx.summarize();
    let item = test_item(&report, "MAP_CHROMOSOME_CONFLICT").expect("conflict expected");
    assert_eq!(item.count, 1);
    assert_eq!(item.severity, Severity::Fatal);
}

#[test]
fn test_map_with_chromosome_is_clean() {
    let text = MAP_NO_CHROMOSOME.replace(
        r#"{ subtype map, name "m1" }"#,
        r#"{ subtype map, name "m1" }, { subtype chromosome, name "2" }"#,
    );
    let mut ctx = context_for(&["MAP_CHROMOSOME_CONFLICT"]);
    process(&mut ctx, &text, false);
    let report = ctx.summarize();
    assert!(test_item(&report, "MAP_CHROMOSOME_CONFLICT").is_none());
}

#[test]
fn test_map_without_chromosome_on_bacterium_is_clean() {
    let text = MAP_NO_CHROMOSOME.replace("Eukaryota; Metazoa", "Bacteria; Proteobacteria");
    let mut ctx = context_for(&["MAP_CHROMOSOME_CONFLICT"]);
    process(&mut ctx, &text, false);
    let report = ctx.summarize();
    assert!(test_item(&report, "MAP_CHROMOSOME_CONFLICT").is_none());
}

// ============================================================================
// Positional identity round-trip
// ============================================================================

const MULTI_RECORD: &str = r#"Bioseq-set ::= {
  class genbank,
  seq-set {
    set {
      class pop-set,
      seq-set {
        seq { id "a1", inst { mol dna, length 4, seq-data "ACGT" } },
        seq { id "a2", inst { mol dna, length 4, seq-data "TTTT" } }
      }
    },
    set {
      class pop-set,
      seq-set {
        seq { id "b1", inst { mol dna, length 4, seq-data "GGGG" } }
      }
    }
  }
}

Seq-entry ::= seq { id "c1", inst { mol dna, length 4, seq-data "CCCC" } }
"#;

fn bioseq_paths(big_file: bool) -> Vec<ferro_disc::NodePath> {
    let mut ctx = context_for(&["COUNT_NUCLEOTIDES"]);
    process(&mut ctx, MULTI_RECORD, big_file);
    let report = ctx.summarize();
    let item = test_item(&report, "COUNT_NUCLEOTIDES").expect("sequences counted");
    item.objects.iter().map(|o| o.node().path()).collect()
}

#[test]
fn test_two_independent_decodes_yield_identical_paths() {
    let first = bioseq_paths(false);
    let second = bioseq_paths(false);
    assert_eq!(first.len(), 4);
    assert_eq!(first, second);
}

#[test]
fn test_big_file_mode_yields_identical_paths() {
    let eager = bioseq_paths(false);
    let skipped = bioseq_paths(true);
    assert_eq!(eager, skipped);
}

#[test]
fn test_big_file_mode_yields_identical_reports() {
    let run = |big_file: bool| {
        let mut ctx = context_for(&["COUNT_NUCLEOTIDES", "DUP_DEFLINE", "N_RUNS"]);
        process(&mut ctx, MULTI_RECORD, big_file);
        let report = ctx.summarize();
        report
            .tests
            .iter()
            .map(|t| (t.desc.name, t.item.count, t.item.children.len()))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(false), run(true));
}

// ============================================================================
// Cross-record summarize work
// ============================================================================

#[test]
fn test_dup_defline_across_records() {
    let text = r#"Seq-entry ::= seq {
  id "s1",
  inst { mol dna, length 4, seq-data "ACGT" },
  descr { title "shared defline" }
}

Seq-entry ::= seq {
  id "s2",
  inst { mol dna, length 4, seq-data "ACGT" },
  descr { title "shared defline" }
}

Seq-entry ::= seq {
  id "s3",
  inst { mol dna, length 4, seq-data "ACGT" },
  descr { title "unique defline" }
}
"#;
    let mut ctx = context_for(&["DUP_DEFLINE"]);
    process(&mut ctx, text, false);
    let report = ctx.summarize();
    let item = test_item(&report, "DUP_DEFLINE").expect("duplicates expected");
    assert_eq!(item.children.len(), 1);
    assert_eq!(item.children[0].count, 2);
    assert_eq!(item.children[0].msg, "2 definition lines are identical");
}

#[test]
fn test_strain_taxname_mismatch_cross_references() {
    let text = r#"Seq-entry ::= seq {
  id "s1",
  inst { mol dna, length 4, seq-data "ACGT" },
  descr {
    source {
      org { taxname "Escherichia coli", lineage "Bacteria",
            orgmod { { subtype strain, subname "K-12" } } }
    }
  }
}

Seq-entry ::= seq {
  id "s2",
  inst { mol dna, length 4, seq-data "ACGT" },
  descr {
    source {
      org { taxname "Shigella flexneri", lineage "Bacteria",
            orgmod { { subtype strain, subname "K-12" } } }
    }
  }
}
"#;
    let mut ctx = context_for(&["STRAIN_TAXNAME_MISMATCH"]);
    process(&mut ctx, text, false);
    let report = ctx.summarize();
    let item = test_item(&report, "STRAIN_TAXNAME_MISMATCH").expect("conflict expected");
    assert_eq!(item.children.len(), 1);
    assert_eq!(item.children[0].count, 2);
}

// ============================================================================
// Submit-level dispatch
// ============================================================================

#[test]
fn test_missing_contact_email_flagged() {
    let text = r#"Seq-submit ::= {
  sub { contact { name "Jane Doe" } },
  data { seq { id "s1", inst { mol dna, length 4, seq-data "ACGT" } } }
}"#;
    let mut ctx = context_for(&["SUBMITBLOCK_CONTACT"]);
    process(&mut ctx, text, false);
    let report = ctx.summarize();
    let item = test_item(&report, "SUBMITBLOCK_CONTACT").expect("missing e-mail");
    assert_eq!(item.count, 1);
}

#[test]
fn test_present_contact_email_clean() {
    let text = r#"Seq-submit ::= {
  sub { contact { name "Jane Doe", email "jane@lab.example" } },
  data { seq { id "s1", inst { mol dna, length 4, seq-data "ACGT" } } }
}"#;
    let mut ctx = context_for(&["SUBMITBLOCK_CONTACT"]);
    process(&mut ctx, text, false);
    let report = ctx.summarize();
    assert!(test_item(&report, "SUBMITBLOCK_CONTACT").is_none());
}

// ============================================================================
// Composition facts
// ============================================================================

#[test]
fn test_n_runs_and_percent_n() {
    let data = format!("ACGT{}ACGT", "N".repeat(12));
    let text = format!(
        r#"Seq-entry ::= seq {{
  id "n-seq",
  inst {{ mol dna, length {}, seq-data "{}" }}
}}"#,
        data.len(),
        data
    );
    let mut ctx = context_for(&["N_RUNS", "PERCENT_N"]);
    process(&mut ctx, &text, false);
    let report = ctx.summarize();
    let runs = test_item(&report, "N_RUNS").expect("run expected");
    assert_eq!(runs.count, 1);
    let percent = test_item(&report, "PERCENT_N").expect("percent expected");
    assert_eq!(percent.count, 1);
}

// ============================================================================
// Per-test failure containment
// ============================================================================

struct AlwaysPanics;

impl Check for AlwaysPanics {
    fn visit_bioseq(&mut self, _report: &mut ReportNode, _v: &NodeView<'_>) {
        panic!("synthetic failure");
    }
}

static PANICKING_TEST: TestDescriptor = TestDescriptor {
    name: "PANICKING_TEST",
    code: 9000,
    groups: groups::DEFAULT,
    description: "always fails, for containment testing",
    aliases: &[],
    partitions: &[Partition::Bioseq],
    autofix: false,
    factory: || Box::new(AlwaysPanics),
};

#[test]
fn test_failing_test_becomes_one_report_row() {
    let mut ctx = context_for(&["COUNT_NUCLEOTIDES"]);
    ctx.register(&PANICKING_TEST);
    process(&mut ctx, MULTI_RECORD, false);
    let report = ctx.summarize();

    let failed = test_item(&report, "PANICKING_TEST").expect("failure row expected");
    assert_eq!(failed.children.len(), 1);
    assert_eq!(
        failed.children[0].msg,
        "EXCEPTION caught: synthetic failure"
    );

    // the failure is contained: other tests still ran over every node
    let counted = test_item(&report, "COUNT_NUCLEOTIDES").expect("count still present");
    assert_eq!(counted.count, 4);
}

// ============================================================================
// Fatal input errors
// ============================================================================

#[test]
fn test_unsupported_top_level_aborts_run() {
    let mut ctx = context_for(&["COUNT_NUCLEOTIDES"]);
    let reader = AsnReader::new(
        Cursor::new(b"Seq-align ::= { }".to_vec()),
        "bad.sqn",
    );
    let err = ctx
        .process_source(reader, false, Path::new("bad.sqn"))
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("Seq-align"));
    assert!(msg.contains("bad.sqn"));
}

//! Autofix replay tests over real files.
//!
//! These exercise the full two-pass contract: analysis remembers only
//! positions, replay re-streams the original bytes, matches anchors
//! structurally, and rewrites only the flagged subtrees.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use tempfile::TempDir;

use ferro_disc::{DiscrepancyContext, RunSettings, TestSelection};

fn write_input(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn country_context() -> DiscrepancyContext {
    DiscrepancyContext::new(RunSettings {
        big_file: false,
        selection: TestSelection {
            include: vec!["COUNTRY_COLON".to_string()],
            ..TestSelection::default()
        },
    })
}

const COLONED: &str = r#"Seq-entry ::= seq {
  id "seq1",
  inst { mol dna, length 8, seq-data "ACGTACGT" },
  descr {
    source {
      genome genomic,
      org { taxname "Homo sapiens", lineage "Eukaryota; Metazoa" },
      subtype { { subtype country, name "France:" } }
    }
  }
}"#;

// ============================================================================
// Scenario: trailing colon stripped from a country qualifier
// ============================================================================

#[test]
fn test_country_colon_fix_applies_and_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "input.sqn", COLONED);

    let mut ctx = country_context();
    ctx.process_file(&input).unwrap();
    let report = ctx.summarize();
    let flagged = report
        .tests
        .iter()
        .find(|t| t.desc.name == "COUNTRY_COLON")
        .expect("colon must be flagged");
    assert_eq!(flagged.item.count, 1);
    assert!(flagged.item.autofix);
    let obj = &flagged.item.objects[0];
    assert!(obj.can_autofix());

    let summary = ctx.autofix().unwrap();
    assert_eq!(summary.applied, 1);
    assert_eq!(summary.outputs, vec![dir.path().join("input.autofix.sqn")]);

    // the object is now fixed and excluded from further attempts
    assert!(obj.is_fixed());
    assert!(!obj.can_autofix());

    let fixed_text = fs::read_to_string(&summary.outputs[0]).unwrap();
    assert!(fixed_text.contains(r#"name "France""#));
    assert!(!fixed_text.contains("France:"));

    // second invocation in the same run: nothing left to fix, no output
    let second = ctx.autofix().unwrap();
    assert_eq!(second.applied, 0);
    assert!(second.outputs.is_empty());
}

#[test]
fn test_fixed_output_is_clean_on_reanalysis() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "input.sqn", COLONED);

    let mut ctx = country_context();
    ctx.process_file(&input).unwrap();
    ctx.summarize();
    let summary = ctx.autofix().unwrap();

    let mut recheck = country_context();
    recheck.process_file(&summary.outputs[0]).unwrap();
    let report = recheck.summarize();
    assert!(report
        .tests
        .iter()
        .all(|t| t.desc.name != "COUNTRY_COLON"));
}

// ============================================================================
// Default copy: untouched records pass through byte-for-byte
// ============================================================================

#[test]
fn test_untouched_record_is_byte_identical() {
    let clean = r#"Seq-entry ::= seq {
  id "clean1",
  inst { mol dna, length 4, seq-data "ACGT" },
  descr { title "left exactly as it was" }
}"#;
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "two.sqn", &format!("{}\n\n{}\n", clean, COLONED));

    let mut ctx = country_context();
    ctx.process_file(&input).unwrap();
    ctx.summarize();
    let summary = ctx.autofix().unwrap();
    assert_eq!(summary.applied, 1);

    let output = fs::read_to_string(&summary.outputs[0]).unwrap();
    // the clean record was raw-copied, not re-serialized
    assert!(output.contains(clean));
    assert!(output.contains(r#"name "France""#));
}

// ============================================================================
// Multiple fixes in one file, stable order
// ============================================================================

#[test]
fn test_two_fixes_in_one_file() {
    let second = COLONED
        .replace("seq1", "seq2")
        .replace("France:", "Chile:");
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "many.sqn", &format!("{}\n\n{}\n", COLONED, second));

    let mut ctx = country_context();
    ctx.process_file(&input).unwrap();
    ctx.summarize();
    let summary = ctx.autofix().unwrap();
    assert_eq!(summary.applied, 2);

    let output = fs::read_to_string(&summary.outputs[0]).unwrap();
    assert!(output.contains(r#"name "France""#));
    assert!(output.contains(r#"name "Chile""#));
    assert!(!output.contains("France:"));
    assert!(!output.contains("Chile:"));
}

// ============================================================================
// Fixes across multiple files
// ============================================================================

#[test]
fn test_each_file_gets_its_own_output() {
    let dir = TempDir::new().unwrap();
    let one = write_input(&dir, "one.sqn", COLONED);
    let two = write_input(
        &dir,
        "two.sqn",
        &COLONED.replace("France:", "Peru:").replace("seq1", "seq9"),
    );

    let mut ctx = country_context();
    ctx.process_file(&one).unwrap();
    ctx.process_file(&two).unwrap();
    ctx.summarize();
    let summary = ctx.autofix().unwrap();
    assert_eq!(summary.applied, 2);
    assert_eq!(summary.outputs.len(), 2);
    assert!(fs::read_to_string(&summary.outputs[0])
        .unwrap()
        .contains(r#"name "France""#));
    assert!(fs::read_to_string(&summary.outputs[1])
        .unwrap()
        .contains(r#"name "Peru""#));
}

// ============================================================================
// Gzipped input: eager decode, plain-text output, whole-suffix naming
// ============================================================================

#[test]
fn test_gzip_input_round_trip() {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("input.sqn.gz");
    let mut encoder = GzEncoder::new(fs::File::create(&path).unwrap(), Compression::default());
    encoder.write_all(COLONED.as_bytes()).unwrap();
    encoder.finish().unwrap();

    let mut ctx = country_context();
    ctx.process_file(&path).unwrap();
    ctx.summarize();
    let summary = ctx.autofix().unwrap();
    assert_eq!(summary.applied, 1);
    assert_eq!(
        summary.outputs,
        vec![dir.path().join("input.sqn.gz.autofix.sqn")]
    );
    // output is plain text regardless of input compression
    let output = fs::read_to_string(&summary.outputs[0]).unwrap();
    assert!(output.contains(r#"name "France""#));
}

// ============================================================================
// Declined fixes are a no-op, not an error
// ============================================================================

#[test]
fn test_internal_colon_is_flagged_but_declined() {
    let dir = TempDir::new().unwrap();
    let input = write_input(
        &dir,
        "input.sqn",
        &COLONED.replace("France:", "USA: Texas"),
    );

    let mut ctx = country_context();
    ctx.process_file(&input).unwrap();
    let report = ctx.summarize();
    assert!(report
        .tests
        .iter()
        .any(|t| t.desc.name == "COUNTRY_COLON"));

    let summary = ctx.autofix().unwrap();
    assert_eq!(summary.applied, 0);
    assert_eq!(summary.declined, 1);
    // the value is untouched in the rewritten record
    let output = fs::read_to_string(&summary.outputs[0]).unwrap();
    assert!(output.contains("USA: Texas"));
}

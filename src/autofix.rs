//! Autofix replay engine.
//!
//! Two phases. Collection gathers every fixable report object across all
//! tests and sorts them into a stable top-to-bottom application order.
//! Replay then re-streams each original file through a copying pass: records
//! with no pending fix are copied through as raw bytes, records with one are
//! decoded in full, the owning tests' fix callbacks are invoked against the
//! freshly rebuilt tree, and the mutated record is written out instead.
//!
//! Matching is positional. A fix anchor is located in the rebuilt tree by
//! walking its (kind, index) chain — the live objects from the analysis pass
//! are gone, and pointer identity would be meaningless anyway. An anchor
//! that cannot be found (an earlier fix may have consumed it) is skipped
//! silently; a failing callback skips that one object and nothing else.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::asn::{
    open_input, write_top_level, AsnReader, Bioseq, BioseqSet, SeqDesc, SeqEntry, SeqFeat,
    SetMember, SubmitBlock, SeqSubmit, TopLevel, TopLevelKind,
};
use crate::context::RegisteredCheck;
use crate::report::DiscrepancyObject;
use crate::tree::{KindCounter, NodeKind, NodePath};
use crate::Result;

/// Mutable access to the node a fix anchors at, one variant per fixable
/// node kind.
pub enum FixTarget<'a> {
    Seq(&'a mut Bioseq),
    Set(&'a mut BioseqSet),
    Desc(&'a mut SeqDesc),
    Feat(&'a mut SeqFeat),
    SubmitBlock(&'a mut SubmitBlock),
}

/// Outcome counters for one autofix run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AutofixSummary {
    /// Fixes positively applied.
    pub applied: usize,
    /// Callbacks that declined to change anything.
    pub declined: usize,
    /// Anchors that could not be located, plus callbacks that failed.
    pub missed: usize,
    /// Output files written, one per input file that had pending fixes.
    pub outputs: Vec<PathBuf>,
}

struct PendingFix {
    check_idx: usize,
    obj: Arc<DiscrepancyObject>,
    path: NodePath,
}

/// Collect and apply all pending fixes. Files without fixable objects
/// produce no output file.
pub fn run(
    checks: &[RegisteredCheck],
    files: &[PathBuf],
    compressed: &[bool],
) -> Result<AutofixSummary> {
    let mut fixes: Vec<PendingFix> = Vec::new();
    for (check_idx, rc) in checks.iter().enumerate() {
        if !rc.desc.autofix {
            continue;
        }
        for obj in rc.report.all_objects() {
            if obj.can_autofix() {
                let anchor = obj.fix_anchor().expect("can_autofix implies an anchor");
                fixes.push(PendingFix {
                    check_idx,
                    path: anchor.path(),
                    obj,
                });
            }
        }
    }
    fixes.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(count = fixes.len(), "collected fixable objects");

    let mut summary = AutofixSummary::default();
    for (file_idx, input) in files.iter().enumerate() {
        let file_fixes: Vec<&PendingFix> = fixes
            .iter()
            .filter(|f| f.path.file_index() == Some(file_idx as u32))
            .collect();
        if file_fixes.is_empty() {
            continue;
        }
        let was_compressed = compressed.get(file_idx).copied().unwrap_or(false);
        let output = autofix_output_path(input, was_compressed);
        replay_file(checks, input, &output, &file_fixes, &mut summary)?;
        summary.outputs.push(output);
    }
    Ok(summary)
}

/// The output file name gains an `.autofix` component before the final
/// extension; names without a dot, and compressed inputs (whose output is
/// always plain text), get `.autofix.sqn` appended whole.
pub fn autofix_output_path(input: &Path, compressed: bool) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.rsplit_once('.') {
        Some((stem, ext)) if !compressed => {
            input.with_file_name(format!("{}.autofix.{}", stem, ext))
        }
        _ => input.with_file_name(format!("{}.autofix.sqn", name)),
    }
}

fn replay_file(
    checks: &[RegisteredCheck],
    input: &Path,
    output: &Path,
    fixes: &[&PendingFix],
    summary: &mut AutofixSummary,
) -> Result<()> {
    let (stream, _) = open_input(input)?;
    let mut reader = AsnReader::new(stream, input.display().to_string());
    let mut out = BufWriter::new(File::create(output)?);
    let mut counter = KindCounter::default();

    while let Some((kind, start)) = reader.next_top_level()? {
        let node_kind = match kind {
            TopLevelKind::Submit => NodeKind::Submit,
            TopLevelKind::Set => NodeKind::SeqSet,
            TopLevelKind::Seq => NodeKind::Bioseq,
            TopLevelKind::Entry => {
                if reader.peek_entry_is_set()? {
                    NodeKind::SeqSet
                } else {
                    NodeKind::Bioseq
                }
            }
        };
        let record_index = counter.next(node_kind);
        let record_fixes: Vec<&&PendingFix> = fixes
            .iter()
            .filter(|f| f.path.0.get(1) == Some(&(node_kind, record_index)))
            .collect();

        if record_fixes.is_empty() {
            // default copy: byte-for-byte
            reader.skip_top_level(kind)?;
            let end = reader.position();
            reader.copy_raw(&mut out, start, end)?;
            out.write_all(b"\n")?;
            continue;
        }

        let mut top = reader.read_top_level(kind)?;
        for fix in record_fixes {
            apply_one(checks, fix, &mut top, summary);
        }
        write_top_level(&mut out, &top).map_err(crate::error::DiscError::from)?;
    }
    out.flush()?;
    Ok(())
}

fn apply_one(
    checks: &[RegisteredCheck],
    fix: &PendingFix,
    top: &mut TopLevel,
    summary: &mut AutofixSummary,
) {
    let Some(mut target) = resolve_target(top, &fix.path) else {
        // absence of a match is a valid steady state, not a fault
        tracing::debug!(object = fix.obj.short_text(), "fix anchor not found");
        summary.missed += 1;
        return;
    };
    let rc = &checks[fix.check_idx];
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        rc.check.autofix(&fix.obj, &mut target)
    }));
    match outcome {
        Ok(true) => {
            fix.obj.mark_fixed();
            summary.applied += 1;
        }
        Ok(false) => summary.declined += 1,
        Err(_) => {
            tracing::warn!(
                test = rc.desc.name,
                object = fix.obj.short_text(),
                "fix callback failed; object left unfixed"
            );
            summary.missed += 1;
        }
    }
}

/// Resolve a fix-anchor path inside a freshly decoded record. Returns
/// `None` on any structural mismatch.
fn resolve_target<'a>(top: &'a mut TopLevel, path: &NodePath) -> Option<FixTarget<'a>> {
    let steps = &path.0;
    if steps.len() < 2 || steps[0].0 != NodeKind::File {
        return None;
    }
    let rest = &steps[2..];
    match top {
        TopLevel::Submit(submit) => resolve_in_submit(submit, rest),
        TopLevel::Entry(entry) => resolve_in_entry(entry, rest),
    }
}

fn resolve_in_submit<'a>(
    submit: &'a mut SeqSubmit,
    steps: &[(NodeKind, u32)],
) -> Option<FixTarget<'a>> {
    let (step, rest) = steps.split_first()?;
    match step.0 {
        NodeKind::SubmitBlock if step.1 == 0 && rest.is_empty() => {
            Some(FixTarget::SubmitBlock(&mut submit.block))
        }
        NodeKind::SeqSet | NodeKind::Bioseq => {
            let entry = nth_entry_of_kind(submit.entries.iter_mut(), step.0, step.1)?;
            resolve_in_entry(entry, rest)
        }
        _ => None,
    }
}

fn resolve_in_entry<'a>(
    entry: &'a mut SeqEntry,
    steps: &[(NodeKind, u32)],
) -> Option<FixTarget<'a>> {
    let Some((step, rest)) = steps.split_first() else {
        return Some(match entry {
            SeqEntry::Seq(seq) => FixTarget::Seq(seq),
            SeqEntry::Set(set) => FixTarget::Set(set),
        });
    };
    match step.0 {
        NodeKind::SeqDesc if rest.is_empty() => {
            let descr = match entry {
                SeqEntry::Seq(seq) => &mut seq.descr,
                SeqEntry::Set(set) => &mut set.descr,
            };
            descr.get_mut(step.1 as usize).map(FixTarget::Desc)
        }
        NodeKind::SeqFeat if rest.is_empty() => {
            let annot = match entry {
                SeqEntry::Seq(seq) => &mut seq.annot,
                SeqEntry::Set(set) => &mut set.annot,
            };
            annot
                .iter_mut()
                .flat_map(|a| a.ftable.iter_mut())
                .nth(step.1 as usize)
                .map(FixTarget::Feat)
        }
        NodeKind::SeqSet | NodeKind::Bioseq => {
            let SeqEntry::Set(set) = entry else {
                return None;
            };
            let members = set.seq_set.iter_mut().filter_map(|m| match m {
                SetMember::Entry(e) => Some(e),
                SetMember::Deferred { .. } => None,
            });
            let child = nth_entry_of_kind(members, step.0, step.1)?;
            resolve_in_entry(child, rest)
        }
        _ => None,
    }
}

/// The `index`-th entry of the given node kind, counting same-kind siblings
/// only — the same counting the tree builder uses.
fn nth_entry_of_kind<'a>(
    entries: impl Iterator<Item = &'a mut SeqEntry>,
    kind: NodeKind,
    index: u32,
) -> Option<&'a mut SeqEntry> {
    let mut count = 0;
    for entry in entries {
        let matches = match (kind, &*entry) {
            (NodeKind::SeqSet, SeqEntry::Set(_)) => true,
            (NodeKind::Bioseq, SeqEntry::Seq(_)) => true,
            _ => false,
        };
        if matches {
            if count == index {
                return Some(entry);
            }
            count += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autofix_output_path_inserts_component() {
        assert_eq!(
            autofix_output_path(Path::new("/data/input.sqn"), false),
            Path::new("/data/input.autofix.sqn")
        );
        assert_eq!(
            autofix_output_path(Path::new("records.asn1"), false),
            Path::new("records.autofix.asn1")
        );
    }

    #[test]
    fn test_autofix_output_path_no_extension() {
        assert_eq!(
            autofix_output_path(Path::new("/data/input"), false),
            Path::new("/data/input.autofix.sqn")
        );
    }

    #[test]
    fn test_autofix_output_path_compressed_appends_whole() {
        assert_eq!(
            autofix_output_path(Path::new("/data/input.sqn.gz"), true),
            Path::new("/data/input.sqn.gz.autofix.sqn")
        );
    }

    #[test]
    fn test_resolve_desc_target() {
        use crate::asn::{MolType, SeqInst};
        let mut top = TopLevel::Entry(SeqEntry::Seq(Bioseq {
            id: "s1".to_string(),
            inst: SeqInst {
                mol: MolType::Dna,
                length: 4,
                data: Some("ACGT".to_string()),
            },
            descr: vec![
                SeqDesc::Title("one".to_string()),
                SeqDesc::Title("two".to_string()),
            ],
            annot: Vec::new(),
        }));
        let path = NodePath(vec![
            (NodeKind::File, 0),
            (NodeKind::Bioseq, 0),
            (NodeKind::SeqDesc, 1),
        ]);
        match resolve_target(&mut top, &path) {
            Some(FixTarget::Desc(SeqDesc::Title(t))) => assert_eq!(t, "two"),
            _ => panic!("expected the second descriptor"),
        }
    }

    #[test]
    fn test_resolve_miss_is_none() {
        use crate::asn::{MolType, SeqInst};
        let mut top = TopLevel::Entry(SeqEntry::Seq(Bioseq {
            id: "s1".to_string(),
            inst: SeqInst {
                mol: MolType::Dna,
                length: 4,
                data: None,
            },
            descr: Vec::new(),
            annot: Vec::new(),
        }));
        let path = NodePath(vec![
            (NodeKind::File, 0),
            (NodeKind::Bioseq, 0),
            (NodeKind::SeqDesc, 0),
        ]);
        assert!(resolve_target(&mut top, &path).is_none());
    }

    #[test]
    fn test_resolve_nested_set_member() {
        use crate::asn::{MolType, SeqInst, SetClass};
        let seq = |id: &str| {
            SeqEntry::Seq(Bioseq {
                id: id.to_string(),
                inst: SeqInst {
                    mol: MolType::Dna,
                    length: 4,
                    data: None,
                },
                descr: Vec::new(),
                annot: Vec::new(),
            })
        };
        let mut top = TopLevel::Entry(SeqEntry::Set(BioseqSet {
            class: SetClass::Genbank,
            descr: Vec::new(),
            annot: Vec::new(),
            seq_set: vec![
                SetMember::Entry(seq("a")),
                SetMember::Entry(seq("b")),
            ],
        }));
        let path = NodePath(vec![
            (NodeKind::File, 0),
            (NodeKind::SeqSet, 0),
            (NodeKind::Bioseq, 1),
        ]);
        match resolve_target(&mut top, &path) {
            Some(FixTarget::Seq(seq)) => assert_eq!(seq.id, "b"),
            _ => panic!("expected the second sequence"),
        }
    }
}

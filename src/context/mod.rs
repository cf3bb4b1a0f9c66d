//! Traversal and dispatch engine.
//!
//! [`DiscrepancyContext`] drives the streaming decode of each input file,
//! builds the document tree incrementally, extends deferred subtrees by
//! seeking back into the stream, dispatches every completed node into the
//! registered tests' partitions, and finally runs each test's summarize hook
//! exactly once. Per-test failures are contained: a panicking test body is
//! disabled and surfaces as a single synthetic report row, never as an
//! aborted run.

pub mod facts;
pub mod scope;

use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::asn::parser::ReadSeek;
use crate::asn::{open_input, AsnReader, SeqDesc};
use crate::autofix::AutofixSummary;
use crate::checks::Check;
use crate::config::TestSelection;
use crate::error::DiscError;
use crate::registry::{self, Partition, TestDescriptor};
use crate::report::{DiscrepancyObject, ReportItem, ReportNode, Severity};
use crate::tree::{Inherited, KindCounter, NodeKind, ParseNode, RefNode};
use crate::Result;

use facts::SeqFacts;
use scope::UnitScope;

/// Engine-level settings for one run.
#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    /// Skip deep decode of eligible sibling subtrees, bounding peak memory.
    pub big_file: bool,
    /// Which registered tests participate.
    pub selection: TestSelection,
}

/// Document-wide counters exposed to summarize hooks.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub files: Vec<String>,
    pub records: usize,
    pub bioseq_count: usize,
    pub na_count: usize,
    pub aa_count: usize,
}

/// One instantiated test: its static metadata, per-run state, and the
/// report tree it accumulates into.
pub struct RegisteredCheck {
    pub desc: &'static TestDescriptor,
    pub check: Box<dyn Check>,
    pub report: ReportNode,
    /// First failure message; a failed test is disabled for the rest of the
    /// run and reports exactly one synthetic row.
    pub error: Option<String>,
}

/// Read-only view handed to test bodies at each dispatch.
pub struct NodeView<'a> {
    pub node: &'a ParseNode,
    /// Facts for the current Bioseq; absent on set/submit-level dispatches.
    pub facts: Option<&'a SeqFacts>,
    /// Cross-feature resolution for the enclosing biological unit.
    pub scope: Option<&'a UnitScope>,
    objects: &'a RefCell<HashMap<usize, Arc<DiscrepancyObject>>>,
}

impl<'a> NodeView<'a> {
    /// Construct a view directly, outside a running traversal. Exists for
    /// unit tests of check bodies.
    #[doc(hidden)]
    pub fn for_tests(
        node: &'a ParseNode,
        facts: Option<&'a SeqFacts>,
        scope: Option<&'a UnitScope>,
        objects: &'a RefCell<HashMap<usize, Arc<DiscrepancyObject>>>,
    ) -> Self {
        Self {
            node,
            facts,
            scope,
            objects,
        }
    }

    /// The shared report object for a node, created on first request.
    ///
    /// Different code paths reporting the same node receive the same
    /// object, which is what makes identity-based dedup in report buckets
    /// effective.
    pub fn object(&self, node: &Arc<RefNode>) -> Arc<DiscrepancyObject> {
        let key = Arc::as_ptr(node) as usize;
        let mut cache = self.objects.borrow_mut();
        Arc::clone(
            cache
                .entry(key)
                .or_insert_with(|| Arc::new(DiscrepancyObject::new(Arc::clone(node)))),
        )
    }

    /// A fresh fixable object; never cached, since anchor and payload are
    /// specific to the creating test.
    pub fn fixable_object(
        &self,
        node: &Arc<RefNode>,
        anchor: &Arc<RefNode>,
    ) -> DiscrepancyObject {
        DiscrepancyObject::new(Arc::clone(node)).with_fix_anchor(Arc::clone(anchor))
    }
}

/// Context handed to summarize hooks.
pub struct SummarizeCtx<'a> {
    pub stats: &'a RunStats,
}

/// One exported test result.
pub struct TestReport {
    pub desc: &'static TestDescriptor,
    pub item: ReportItem,
}

/// The final product of a run.
pub struct DiscrepancyReport {
    pub tests: Vec<TestReport>,
    pub stats: RunStats,
}

/// The traversal/dispatch engine. One instance per run; reuse across files
/// is supported and accumulates into the same report trees.
pub struct DiscrepancyContext {
    settings: RunSettings,
    checks: Vec<RegisteredCheck>,
    files: Vec<PathBuf>,
    compressed: Vec<bool>,
    generation: u64,
    facts: Option<SeqFacts>,
    scope: Option<UnitScope>,
    objects: RefCell<HashMap<usize, Arc<DiscrepancyObject>>>,
    stats: RunStats,
}

impl DiscrepancyContext {
    /// Instantiate the selected tests in registration (code) order.
    pub fn new(settings: RunSettings) -> Self {
        let checks = registry::all_tests()
            .iter()
            .copied()
            .filter(|desc| settings.selection.selects(desc))
            .map(|desc| RegisteredCheck {
                desc,
                check: (desc.factory)(),
                report: ReportNode::new(desc.name),
                error: None,
            })
            .collect();
        Self {
            settings,
            checks,
            files: Vec::new(),
            compressed: Vec::new(),
            generation: 0,
            facts: None,
            scope: None,
            objects: RefCell::new(HashMap::new()),
            stats: RunStats::default(),
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Names of the instantiated tests, in dispatch order.
    pub fn test_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|rc| rc.desc.name).collect()
    }

    /// Register an additional test beyond the static registry. Embedders
    /// use this to run custom checks through the same dispatch machinery.
    pub fn register(&mut self, desc: &'static TestDescriptor) {
        self.checks.push(RegisteredCheck {
            desc,
            check: (desc.factory)(),
            report: ReportNode::new(desc.name),
            error: None,
        });
    }

    /// Process one input file.
    pub fn process_file(&mut self, path: &Path) -> Result<()> {
        let (stream, compressed) = open_input(path)?;
        // a decompressed stream was decoded eagerly; nothing to skip
        let reader = AsnReader::new(stream, path.display().to_string())
            .with_big_file(self.settings.big_file && !compressed);
        self.process_source(reader, compressed, path)
    }

    /// Process an already-open source. Exposed for in-memory inputs.
    pub fn process_source<R: ReadSeek>(
        &mut self,
        mut reader: AsnReader<R>,
        compressed: bool,
        path: &Path,
    ) -> Result<()> {
        let file_index = u32::try_from(self.files.len()).map_err(|_| DiscError::Io {
            msg: "too many input files".to_string(),
        })?;
        let file_node = RefNode::root(NodeKind::File, file_index);
        file_node.set_label(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        );

        let mut counter = KindCounter::default();
        loop {
            let Some((kind, start)) = reader.next_top_level()? else {
                break;
            };
            tracing::debug!(kind = kind.header(), offset = start, "decoding record");
            let top = reader.read_top_level(kind)?;
            // extension may seek into skipped subtrees; remember where the
            // next record starts
            let resume = reader.position();
            let mut node = ParseNode::from_top_level(top, &file_node, &mut counter);
            node.keep = true;
            self.extend_node(&mut reader, &mut node, None, false)?;
            reader.seek(resume)?;
            self.stats.records += 1;
        }

        self.files.push(path.to_path_buf());
        self.compressed.push(compressed);
        self.stats.files.push(path.display().to_string());
        Ok(())
    }

    /// The extend pass for one node: decode deferred data, build indices and
    /// inherited facts, open a unit scope where appropriate, dispatch tests,
    /// recurse, and release what is no longer needed.
    fn extend_node<R: ReadSeek>(
        &mut self,
        reader: &mut AsnReader<R>,
        node: &mut ParseNode,
        parent_inherited: Option<&Inherited>,
        inside_unit: bool,
    ) -> Result<()> {
        if let Some(offset) = node.deferred {
            tracing::debug!(offset, "re-decoding skipped subtree");
            let entry = reader.read_deferred(offset)?;
            node.fill_deferred(entry);
        }
        node.populate_indices();
        node.compute_inherited(parent_inherited);

        let is_unit = match (node.set_class(), node.bioseq().is_some()) {
            (Some(class), _) => class.is_biological_unit() && !inside_unit,
            (None, true) => !inside_unit,
            _ => false,
        };
        if is_unit {
            self.scope = Some(UnitScope::build(node));
            node.keep = true;
        }

        if let Some(seq) = node.bioseq() {
            self.generation += 1;
            self.stats.bioseq_count += 1;
            if seq.inst.mol.is_na() {
                self.stats.na_count += 1;
            } else {
                self.stats.aa_count += 1;
            }
            self.facts = Some(SeqFacts::new(self.generation, seq, &node.inherited));
        }

        self.run_node_checks(node);

        let inherited = node.inherited.clone();
        let child_inside = inside_unit || is_unit;
        for child in node.children.iter_mut() {
            self.extend_node(reader, child, Some(&inherited), child_inside)?;
            if !child.keep {
                child.release();
            }
        }

        if is_unit {
            // the unit is complete; indices must not outlive it
            if let Some(scope) = self.scope.as_mut() {
                scope.clear();
            }
            self.scope = None;
            for child in node.children.iter_mut() {
                child.release();
            }
        }
        Ok(())
    }

    /// Dispatch one extended node into every interested, still-live test.
    fn run_node_checks(&mut self, node: &ParseNode) {
        let is_bioseq = node.bioseq().is_some();
        let facts = if is_bioseq { self.facts.as_ref() } else { None };
        let scope = self.scope.as_ref();
        let objects = &self.objects;
        let view = NodeView {
            node,
            facts,
            scope,
            objects,
        };

        for rc in self.checks.iter_mut() {
            if rc.error.is_some() {
                continue;
            }
            let desc = rc.desc;
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                if is_bioseq && desc.handles(Partition::Bioseq) {
                    rc.check.visit_bioseq(&mut rc.report, &view);
                }
                if node.set_class().is_some() && desc.handles(Partition::SeqSet) {
                    rc.check.visit_set(&mut rc.report, &view);
                }
                if let Some(block) = node.submit_block() {
                    if desc.handles(Partition::Submit) {
                        rc.check.visit_submit(&mut rc.report, block, &view);
                    }
                }
                if desc.handles(Partition::SeqFeat) {
                    for feat in &node.feats {
                        rc.check.visit_feat(&mut rc.report, feat, &view);
                    }
                }
                if desc.handles(Partition::SeqDesc) {
                    for desc_entry in &node.descs {
                        rc.check.visit_desc(&mut rc.report, desc_entry, &view);
                    }
                }
                if desc.handles(Partition::BioSource) {
                    for &i in &node.biosources {
                        if let SeqDesc::Source(src) = &node.descs[i].desc {
                            rc.check
                                .visit_biosource(&mut rc.report, src, &node.descs[i], &view);
                        }
                    }
                }
                if desc.handles(Partition::Pubdesc) {
                    for (pubdesc, entry) in node.pubdescs() {
                        rc.check.visit_pub(&mut rc.report, pubdesc, entry, &view);
                    }
                }
                if desc.handles(Partition::Author) {
                    for (pubdesc, entry) in node.pubdescs() {
                        for author in &pubdesc.authors {
                            rc.check.visit_author(&mut rc.report, author, entry, &view);
                        }
                    }
                }
            }));
            if let Err(payload) = outcome {
                let msg = panic_message(payload);
                tracing::warn!(test = desc.name, "test body failed: {}", msg);
                rc.error = Some(msg);
            }
        }
    }

    /// Run every test's summarize hook exactly once and export the final
    /// report. Tests that failed anywhere produce a single synthetic row.
    pub fn summarize(&mut self) -> DiscrepancyReport {
        let stats = &self.stats;
        for rc in self.checks.iter_mut() {
            if rc.error.is_none() {
                let ctx = SummarizeCtx { stats };
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    rc.check.summarize(&mut rc.report, &ctx);
                }));
                if let Err(payload) = outcome {
                    rc.error = Some(panic_message(payload));
                }
            }
            if let Some(msg) = &rc.error {
                let row = format!("EXCEPTION caught: {}", msg);
                rc.report.clear();
                rc.report.bucket(&row).set_severity(Severity::Error);
            }
        }
        let tests = self
            .checks
            .iter()
            .filter(|rc| !rc.report.is_empty())
            .map(|rc| TestReport {
                desc: rc.desc,
                item: rc.report.export(),
            })
            .collect();
        DiscrepancyReport {
            tests,
            stats: self.stats.clone(),
        }
    }

    /// Apply every collected fix by replaying the original inputs.
    pub fn autofix(&mut self) -> Result<AutofixSummary> {
        crate::autofix::run(&self.checks, &self.files, &self.compressed)
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown error".to_string()
    }
}

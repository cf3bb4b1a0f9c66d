//! Derived per-sequence facts, memoized per traversal position.
//!
//! A fresh [`SeqFacts`] is built each time the traversal moves to another
//! Bioseq and carries that move's generation number; expensive whole-sequence
//! scans (nucleotide counting, N-run detection) run at most once per
//! generation no matter how many tests ask. Replacing the whole value on
//! generation change is what makes stale-cache bugs impossible when the
//! engine is reused across documents.

use std::cell::OnceCell;
use std::sync::OnceLock;

use regex::Regex;

use crate::asn::{BioSource, Bioseq, Genome, MolInfo};
use crate::tree::Inherited;

/// Minimum length of an N run worth reporting.
pub const MIN_N_RUN: usize = 10;

/// Percentage of Ns above which a sequence is flagged.
pub const MAX_PERCENT_N: f64 = 5.0;

/// Result of the one-time composition scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub total: usize,
    pub n_count: usize,
    /// Runs of [`MIN_N_RUN`] or more consecutive Ns as (start, length),
    /// 0-based.
    pub n_runs: Vec<(usize, usize)>,
}

impl Composition {
    fn scan(data: &str) -> Self {
        let mut n_count = 0;
        let mut n_runs = Vec::new();
        let mut run_start = None;
        let bytes = data.as_bytes();
        for (i, &b) in bytes.iter().enumerate() {
            if b == b'N' || b == b'n' {
                n_count += 1;
                if run_start.is_none() {
                    run_start = Some(i);
                }
            } else if let Some(start) = run_start.take() {
                if i - start >= MIN_N_RUN {
                    n_runs.push((start, i - start));
                }
            }
        }
        if let Some(start) = run_start {
            let len = bytes.len() - start;
            if len >= MIN_N_RUN {
                n_runs.push((start, len));
            }
        }
        Self {
            total: bytes.len(),
            n_count,
            n_runs,
        }
    }
}

/// Memoized facts about the traversal's current Bioseq.
#[derive(Debug)]
pub struct SeqFacts {
    generation: u64,
    pub id: String,
    pub length: usize,
    pub is_na: bool,
    data: Option<String>,
    biosource: Option<BioSource>,
    molinfo: Option<MolInfo>,
    title: Option<String>,
    composition: OnceCell<Composition>,
}

impl SeqFacts {
    /// Snapshot a Bioseq and its inherited descriptors under the given
    /// generation number.
    pub fn new(generation: u64, seq: &Bioseq, inherited: &Inherited) -> Self {
        Self {
            generation,
            id: seq.id.clone(),
            length: seq.inst.length,
            is_na: seq.inst.mol.is_na(),
            data: seq.inst.data.clone(),
            biosource: inherited.biosource.clone(),
            molinfo: inherited.molinfo.clone(),
            title: inherited.title.clone(),
            composition: OnceCell::new(),
        }
    }

    /// The generation this snapshot belongs to; changes exactly when the
    /// traversal moves to another Bioseq.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The composition summary, scanned on first use.
    pub fn composition(&self) -> &Composition {
        self.composition
            .get_or_init(|| Composition::scan(self.data.as_deref().unwrap_or("")))
    }

    pub fn percent_n(&self) -> f64 {
        let comp = self.composition();
        if comp.total == 0 {
            0.0
        } else {
            comp.n_count as f64 * 100.0 / comp.total as f64
        }
    }

    /// The effective biosource (own or nearest ancestor's).
    pub fn biosource(&self) -> Option<&BioSource> {
        self.biosource.as_ref()
    }

    pub fn molinfo(&self) -> Option<&MolInfo> {
        self.molinfo.as_ref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn lineage(&self) -> Option<&str> {
        self.biosource
            .as_ref()
            .and_then(|src| src.org.lineage.as_deref())
    }

    pub fn is_eukaryote(&self) -> bool {
        lineage_is_eukaryotic(self.lineage().unwrap_or(""))
    }

    pub fn is_bacterial(&self) -> bool {
        lineage_contains(self.lineage().unwrap_or(""), "Bacteria")
    }

    pub fn is_viral(&self) -> bool {
        lineage_contains(self.lineage().unwrap_or(""), "Viruses")
    }

    pub fn organelle(&self) -> Genome {
        self.biosource
            .as_ref()
            .map(|src| src.genome)
            .unwrap_or_default()
    }
}

fn lineage_contains(lineage: &str, clade: &str) -> bool {
    lineage.split(';').any(|part| part.trim() == clade)
}

/// A lineage names a eukaryote when its first-rank clade says so.
pub fn lineage_is_eukaryotic(lineage: &str) -> bool {
    lineage_contains(lineage, "Eukaryota")
}

pub fn lineage_is_bacterial(lineage: &str) -> bool {
    lineage_contains(lineage, "Bacteria")
}

pub fn lineage_is_viral(lineage: &str) -> bool {
    lineage_contains(lineage, "Viruses")
}

static LOCUS_TAG_RE: OnceLock<Regex> = OnceLock::new();

/// Locus tags must be `<prefix>_<suffix>` with an alphanumeric prefix
/// starting with a letter and an alphanumeric suffix.
pub fn is_valid_locus_tag(tag: &str) -> bool {
    let re = LOCUS_TAG_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9]*_[A-Za-z0-9]+$").expect("static pattern")
    });
    re.is_match(tag)
}

//! Registry of all discrepancy tests.
//!
//! Every test is declared once in [`crate::checks::TESTS`] with an explicit
//! numeric code; registration order is that list's order, never load-time
//! side effects, so dispatch order is deterministic across builds. This
//! module indexes the list for name/alias lookup and group listings, and is
//! what the `disc list-tests` and `disc explain` commands read.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::checks::{Check, TESTS};

/// Node-kind partitions a test can subscribe to.
///
/// The traversal dispatches a node only into the partitions its populated
/// indices make relevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Bioseq,
    SeqSet,
    SeqFeat,
    SeqDesc,
    BioSource,
    Pubdesc,
    Author,
    Submit,
    Text,
}

/// Test group flags.
pub mod groups {
    /// Runs unless explicitly excluded.
    pub const DEFAULT: u32 = 1 << 0;
    /// Pre-submission checks.
    pub const SUBMITTER: u32 = 1 << 1;
    /// Curation (on-caller) checks.
    pub const ONCALLER: u32 = 1 << 2;
    /// Checks that stay cheap on very large inputs.
    pub const BIG: u32 = 1 << 3;

    /// Render a flag set as a comma-separated list.
    pub fn names(flags: u32) -> String {
        let mut out = Vec::new();
        if flags & DEFAULT != 0 {
            out.push("default");
        }
        if flags & SUBMITTER != 0 {
            out.push("submitter");
        }
        if flags & ONCALLER != 0 {
            out.push("oncaller");
        }
        if flags & BIG != 0 {
            out.push("big");
        }
        out.join(", ")
    }

    /// Parse one group name; unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<u32> {
        match name.to_ascii_lowercase().as_str() {
            "default" => Some(DEFAULT),
            "submitter" => Some(SUBMITTER),
            "oncaller" => Some(ONCALLER),
            "big" => Some(BIG),
            _ => None,
        }
    }
}

/// Static metadata for one registered discrepancy test.
pub struct TestDescriptor {
    /// Canonical upper-case test name.
    pub name: &'static str,
    /// Stable numeric code; also the registration order key.
    pub code: u32,
    pub groups: u32,
    pub description: &'static str,
    pub aliases: &'static [&'static str],
    pub partitions: &'static [Partition],
    /// Whether the test ships an autofix callback.
    pub autofix: bool,
    /// Construct a fresh per-run instance of the test body.
    pub factory: fn() -> Box<dyn Check>,
}

impl TestDescriptor {
    pub fn in_group(&self, flags: u32) -> bool {
        self.groups & flags != 0
    }

    pub fn handles(&self, partition: Partition) -> bool {
        self.partitions.contains(&partition)
    }
}

struct Registry {
    by_code: Vec<&'static TestDescriptor>,
    by_name: HashMap<String, &'static TestDescriptor>,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| {
        let mut by_code: Vec<&'static TestDescriptor> = TESTS.iter().collect();
        by_code.sort_by_key(|d| d.code);
        let mut by_name = HashMap::new();
        for desc in TESTS {
            by_name.insert(desc.name.to_ascii_uppercase(), desc);
            for alias in desc.aliases {
                by_name.insert(alias.to_ascii_uppercase(), desc);
            }
        }
        Registry { by_code, by_name }
    })
}

/// Look a test up by name or alias, case-insensitively.
pub fn find_test(name: &str) -> Option<&'static TestDescriptor> {
    registry().by_name.get(&name.to_ascii_uppercase()).copied()
}

/// All tests in code order.
pub fn all_tests() -> &'static [&'static TestDescriptor] {
    &registry().by_code
}

/// Tests carrying any of the given group flags, in code order.
pub fn tests_in_group(flags: u32) -> Vec<&'static TestDescriptor> {
    registry()
        .by_code
        .iter()
        .filter(|d| d.in_group(flags))
        .copied()
        .collect()
}

/// Tests declaring an autofix callback, in code order.
pub fn autofix_tests() -> Vec<&'static TestDescriptor> {
    registry()
        .by_code
        .iter()
        .filter(|d| d.autofix)
        .copied()
        .collect()
}

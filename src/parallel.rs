//! Parallel processing support for ferro-disc
//!
//! Each input file is independent state — collection and replay never cross
//! file boundaries — so whole files can be fanned out across a thread pool.
//! The core stays single-threaded per file. Enable with the `parallel`
//! feature.

use std::path::PathBuf;

use rayon::prelude::*;

use crate::context::{DiscrepancyContext, DiscrepancyReport, RunSettings};
use crate::Result;

/// Process many files in parallel, one engine per file.
///
/// Returns one result per input path, order preserved. Cross-file
/// summarize aggregation does not apply here; fold the raw report trees
/// with [`crate::report::ReportNode::merge`] when combined totals are
/// needed.
pub fn run_files_parallel(
    paths: &[PathBuf],
    settings: &RunSettings,
) -> Vec<(PathBuf, Result<DiscrepancyReport>)> {
    paths
        .par_iter()
        .map(|path| {
            let mut ctx = DiscrepancyContext::new(settings.clone());
            let outcome = ctx.process_file(path).map(|()| ctx.summarize());
            (path.clone(), outcome)
        })
        .collect()
}

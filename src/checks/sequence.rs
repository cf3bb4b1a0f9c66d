//! Sequence-level checks: counts, composition, duplicated deflines.

use std::sync::Arc;

use crate::context::facts::MAX_PERCENT_N;
use crate::context::{NodeView, SummarizeCtx};
use crate::report::{DiscrepancyObject, ReportNode};
use crate::tree::DescIndex;

use super::{group_by_key, Check};

/// Counts nucleotide sequences; always reports as a summary row.
#[derive(Default)]
pub struct CountNucleotides;

impl Check for CountNucleotides {
    fn visit_bioseq(&mut self, report: &mut ReportNode, v: &NodeView<'_>) {
        let Some(facts) = v.facts else { return };
        if facts.is_na {
            report
                .bucket("[n] nucleotide Bioseq[s] [is] present")
                .set_summary(true)
                .add(v.object(&v.node.node));
        }
    }
}

/// Flags sequences containing runs of 10 or more consecutive Ns.
#[derive(Default)]
pub struct NRuns;

impl Check for NRuns {
    fn visit_bioseq(&mut self, report: &mut ReportNode, v: &NodeView<'_>) {
        let Some(facts) = v.facts else { return };
        if !facts.is_na {
            return;
        }
        let runs = &facts.composition().n_runs;
        if runs.is_empty() {
            return;
        }
        let obj = v.object(&v.node.node);
        let bucket = report.bucket("[n] sequence[s] [has] runs of 10 or more Ns");
        bucket.add(Arc::clone(&obj));
        let spans = runs
            .iter()
            .map(|&(start, len)| format!("{}-{}", start + 1, start + len))
            .collect::<Vec<_>>()
            .join(", ");
        bucket
            .bucket(&format!("{} has runs at {}", facts.id, spans))
            .set_extended(true)
            .add(obj);
    }
}

/// Flags sequences whose N content exceeds 5%.
#[derive(Default)]
pub struct PercentN;

impl Check for PercentN {
    fn visit_bioseq(&mut self, report: &mut ReportNode, v: &NodeView<'_>) {
        let Some(facts) = v.facts else { return };
        if facts.is_na && facts.percent_n() > MAX_PERCENT_N {
            report
                .bucket("[n] sequence[s] [has] more than 5% Ns")
                .add(v.object(&v.node.node));
        }
    }
}

/// Flags definition lines repeated verbatim across the submission.
///
/// Collection happens per descriptor; the grouping is cross-document work
/// and waits for summarize.
#[derive(Default)]
pub struct DupDefline {
    titles: Vec<(String, Arc<DiscrepancyObject>)>,
}

impl Check for DupDefline {
    fn visit_desc(&mut self, _report: &mut ReportNode, desc: &DescIndex, v: &NodeView<'_>) {
        if let Some(title) = desc.desc.as_title() {
            self.titles.push((title.to_string(), v.object(&desc.node)));
        }
    }

    fn summarize(&mut self, report: &mut ReportNode, _ctx: &SummarizeCtx<'_>) {
        let groups = group_by_key(std::mem::take(&mut self.titles));
        for (title, objects) in groups {
            if objects.len() < 2 {
                continue;
            }
            let bucket = report.bucket("[n] definition line[s] [is] identical");
            let detail = bucket.bucket(&format!("\"{}\"", title));
            detail.set_extended(true);
            for obj in objects {
                detail.add(obj);
            }
        }
    }
}

//! Organism-source checks.

use std::sync::Arc;

use crate::asn::{BioSource, SeqDesc};
use crate::autofix::FixTarget;
use crate::context::facts::lineage_is_eukaryotic;
use crate::context::{NodeView, SummarizeCtx};
use crate::report::{DiscrepancyObject, ReportNode, Severity};
use crate::tree::DescIndex;

use super::{group_by_key, Check};

/// Eukaryotic sources carrying a `map` subsource without a `chromosome`.
#[derive(Default)]
pub struct MapChromosomeConflict;

impl Check for MapChromosomeConflict {
    fn visit_biosource(
        &mut self,
        report: &mut ReportNode,
        src: &BioSource,
        desc: &DescIndex,
        v: &NodeView<'_>,
    ) {
        let lineage = src.org.lineage.as_deref().unwrap_or("");
        if !lineage_is_eukaryotic(lineage) {
            return;
        }
        if src.has_subsource("map") && !src.has_subsource("chromosome") {
            report
                .bucket("[n] source[s] [has] map but not chromosome")
                .set_severity(Severity::Fatal)
                .add(v.object(&desc.node));
        }
    }
}

/// Country qualifiers with colons; the fix strips trailing colon runs.
#[derive(Default)]
pub struct CountryColon;

impl Check for CountryColon {
    fn visit_biosource(
        &mut self,
        report: &mut ReportNode,
        src: &BioSource,
        desc: &DescIndex,
        v: &NodeView<'_>,
    ) {
        let Some(country) = src.subsource("country") else {
            return;
        };
        if !country.contains(':') {
            return;
        }
        let obj = Arc::new(v.fixable_object(&desc.node, &desc.node));
        report
            .bucket("[n] country source[s] appear[S] to have colon[s]")
            .set_autofix(true)
            .add(obj);
    }

    fn autofix(&self, _obj: &DiscrepancyObject, target: &mut FixTarget<'_>) -> bool {
        let FixTarget::Desc(desc) = target else {
            return false;
        };
        let SeqDesc::Source(src) = desc else {
            return false;
        };
        let Some(sub) = src.subsource_mut("country") else {
            return false;
        };
        let trimmed = sub
            .name
            .trim_end()
            .trim_end_matches(':')
            .trim_end()
            .to_string();
        if trimmed == sub.name {
            return false;
        }
        sub.name = trimmed;
        true
    }
}

/// Strains attached to more than one taxname. Matches can only be judged
/// against each other, so the work happens at summarize.
#[derive(Default)]
pub struct StrainTaxnameMismatch {
    seen: Vec<(String, (String, Arc<DiscrepancyObject>))>,
}

impl Check for StrainTaxnameMismatch {
    fn visit_biosource(
        &mut self,
        _report: &mut ReportNode,
        src: &BioSource,
        desc: &DescIndex,
        v: &NodeView<'_>,
    ) {
        if let Some(strain) = src.org.orgmod("strain") {
            self.seen.push((
                strain.to_string(),
                (src.org.taxname.clone(), v.object(&desc.node)),
            ));
        }
    }

    fn summarize(&mut self, report: &mut ReportNode, _ctx: &SummarizeCtx<'_>) {
        for (strain, entries) in group_by_key(std::mem::take(&mut self.seen)) {
            let first_taxname = &entries[0].0;
            if entries.iter().all(|(taxname, _)| taxname == first_taxname) {
                continue;
            }
            let bucket = report.bucket(&format!(
                "[n] biosource[s] [has] strain {} but [does] not have the same taxname",
                strain
            ));
            for (_, obj) in entries {
                bucket.add(obj);
            }
        }
    }
}

//! Feature-level checks.

use crate::asn::FeatKind;
use crate::context::facts::is_valid_locus_tag;
use crate::context::scope::FeatureResolver;
use crate::context::NodeView;
use crate::report::{ReportNode, Severity};
use crate::tree::FeatIndex;

use super::Check;

/// Flags coding regions whose locations intersect an RNA feature on the
/// same sequence. Both sides of each overlap are reported, so the count is
/// rendered with the pair-wise `[n/2]` token.
#[derive(Default)]
pub struct RnaCdsOverlap;

impl Check for RnaCdsOverlap {
    fn visit_feat(&mut self, report: &mut ReportNode, feat: &FeatIndex, v: &NodeView<'_>) {
        if feat.feat.kind != FeatKind::Cdregion {
            return;
        }
        for other in &v.node.feats {
            let is_rna = matches!(
                other.feat.kind,
                FeatKind::Trna | FeatKind::Rrna | FeatKind::Mrna
            );
            if !is_rna || !feat.feat.location.overlaps(&other.feat.location) {
                continue;
            }
            // a coding region inside its own mRNA is the expected layout
            if other.feat.kind == FeatKind::Mrna {
                let expected = v
                    .scope
                    .and_then(|s| s.best_mrna_for_cds(&feat.feat))
                    .map(|m| m.location.contains(&feat.feat.location))
                    .unwrap_or(false);
                if expected {
                    continue;
                }
            }
            let bucket = report.bucket("[n/2] coding regions overlap RNA features");
            bucket.set_severity(Severity::Error);
            bucket.add(v.object(&feat.node));
            bucket.add(v.object(&other.node));
        }
    }
}

/// Flags locus tags that are not in `prefix_suffix` form.
#[derive(Default)]
pub struct BadLocusTagFormat;

impl Check for BadLocusTagFormat {
    fn visit_feat(&mut self, report: &mut ReportNode, feat: &FeatIndex, v: &NodeView<'_>) {
        if feat.feat.kind != FeatKind::Gene {
            return;
        }
        let Some(tag) = feat.feat.qual("locus_tag") else {
            return;
        };
        if !is_valid_locus_tag(tag) {
            report
                .bucket("[n] locus tag[s] [is] incorrectly formatted")
                .add(v.object(&feat.node));
        }
    }
}

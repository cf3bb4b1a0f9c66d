//! Publication checks.

use std::sync::Arc;

use crate::asn::Pubdesc;
use crate::context::{NodeView, SummarizeCtx};
use crate::report::{DiscrepancyObject, ReportNode};
use crate::tree::DescIndex;

use super::{group_by_key, Check};

/// Publications sharing a title but not an author list.
#[derive(Default)]
pub struct TitleAuthorConflict {
    seen: Vec<(String, (String, Arc<DiscrepancyObject>))>,
}

impl Check for TitleAuthorConflict {
    fn visit_pub(
        &mut self,
        _report: &mut ReportNode,
        pubdesc: &Pubdesc,
        desc: &DescIndex,
        v: &NodeView<'_>,
    ) {
        if pubdesc.title.is_empty() {
            return;
        }
        let authors = pubdesc.authors.join(", ");
        self.seen
            .push((pubdesc.title.clone(), (authors, v.object(&desc.node))));
    }

    fn summarize(&mut self, report: &mut ReportNode, _ctx: &SummarizeCtx<'_>) {
        for (title, entries) in group_by_key(std::mem::take(&mut self.seen)) {
            let first_authors = &entries[0].0;
            if entries.iter().all(|(authors, _)| authors == first_authors) {
                continue;
            }
            let bucket = report.bucket(&format!(
                "[n] pub[s] [has] title \"{}\" but [does] not have the same author list",
                title
            ));
            for (_, obj) in entries {
                bucket.add(obj);
            }
        }
    }
}

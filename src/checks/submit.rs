//! Submission-block checks.

use crate::asn::SubmitBlock;
use crate::context::NodeView;
use crate::report::ReportNode;

use super::Check;

/// Submission blocks missing a contact e-mail address.
#[derive(Default)]
pub struct SubmitBlockContact;

impl Check for SubmitBlockContact {
    fn visit_submit(&mut self, report: &mut ReportNode, block: &SubmitBlock, v: &NodeView<'_>) {
        let missing = match &block.contact {
            None => true,
            Some(contact) => contact
                .email
                .as_deref()
                .map(|e| e.trim().is_empty())
                .unwrap_or(true),
        };
        if missing {
            report
                .bucket("[n] submission[s] [is] missing a contact e-mail")
                .add(v.object(&v.node.node));
        }
    }
}

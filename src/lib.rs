// Copyright (c) 2024-2025 Fulcrum Genomics LLC
// SPDX-License-Identifier: MIT

//! ferro-disc: discrepancy reporting for ASN.1 sequence submissions
//!
//! Part of the ferro bioinformatics toolkit.
//!
//! The engine streams a submission document, runs a battery of independent
//! discrepancy tests over it, aggregates matches into a hierarchical report,
//! and can replay the original file to apply targeted fixes in place.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use ferro_disc::{DiscrepancyContext, RunSettings};
//!
//! let mut ctx = DiscrepancyContext::new(RunSettings::default());
//! ctx.process_file(Path::new("submission.sqn")).unwrap();
//! let report = ctx.summarize();
//! for test in &report.tests {
//!     for row in &test.item.children {
//!         println!("{}: {}", test.desc.name, row.msg);
//!     }
//! }
//! ```

pub mod asn;
pub mod autofix;
pub mod checks;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod registry;
pub mod render;
pub mod report;
pub mod tree;

// Re-export commonly used types
pub use autofix::{AutofixSummary, FixTarget};
pub use config::{DiscConfig, TestSelection};
pub use context::{DiscrepancyContext, DiscrepancyReport, NodeView, RunSettings, SummarizeCtx};
pub use error::DiscError;
pub use registry::{find_test, groups, Partition, TestDescriptor};
pub use report::{DiscrepancyObject, ReportItem, ReportNode, Severity};
pub use tree::{NodeKind, NodePath, RefNode};

/// Result type alias for ferro-disc operations
pub type Result<T> = std::result::Result<T, DiscError>;

//! CLI utilities for ferro-disc
//!
//! This module provides testable functions used by the CLI binary. By
//! keeping the output plumbing in the library, the binary stays a thin
//! argument-parsing shell.

use std::io::{self, Write};
use std::str::FromStr;

use crate::context::DiscrepancyReport;
use crate::render::{render_json, render_text, render_xml, RenderOptions};

/// Output format for CLI results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Plain text format (default)
    #[default]
    Text,
    /// JSON format
    Json,
    /// XML format
    Xml,
}

impl FromStr for OutputFormat {
    type Err = std::convert::Infallible;

    /// Parse an output format from a string; anything unrecognized falls
    /// back to text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "xml" => OutputFormat::Xml,
            _ => OutputFormat::Text,
        })
    }
}

/// Write a finished report in the requested format.
pub fn write_report<W: Write>(
    writer: &mut W,
    report: &DiscrepancyReport,
    format: OutputFormat,
    options: RenderOptions,
) -> io::Result<()> {
    match format {
        OutputFormat::Text => render_text(writer, report, options),
        OutputFormat::Xml => render_xml(writer, report, options),
        OutputFormat::Json => render_json(writer, report),
    }
}

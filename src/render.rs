//! Report rendering: text, XML, and JSON output.

use std::io::{self, Write};

use chrono::Local;
use serde_json::json;

use crate::context::DiscrepancyReport;
use crate::report::{ReportItem, Severity};

/// Options shared by the renderers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Include extended (detail-only) rows.
    pub verbose: bool,
    /// List the flagged objects under each row.
    pub show_objects: bool,
}

/// Render the human-readable text report.
pub fn render_text<W: Write>(
    out: &mut W,
    report: &DiscrepancyReport,
    options: RenderOptions,
) -> io::Result<()> {
    writeln!(
        out,
        "Discrepancy Report Results (generated {})",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out)?;
    writeln!(out, "Summary")?;
    for test in &report.tests {
        for child in &test.item.children {
            writeln!(out, "{}", summary_line(test.desc.name, child))?;
        }
        if test.item.children.is_empty() && test.item.count > 0 {
            writeln!(out, "{}", summary_line(test.desc.name, &test.item))?;
        }
    }
    writeln!(out)?;
    writeln!(out, "Detailed Report")?;
    for test in &report.tests {
        writeln!(out)?;
        for child in &test.item.children {
            render_text_item(out, test.desc.name, child, 0, options)?;
        }
    }
    Ok(())
}

fn summary_line(test_name: &str, item: &ReportItem) -> String {
    let prefix = match item.severity {
        Severity::Fatal => "FATAL: ",
        _ => "",
    };
    format!("{}{}: {}", prefix, test_name, item.msg)
}

fn render_text_item<W: Write>(
    out: &mut W,
    test_name: &str,
    item: &ReportItem,
    depth: usize,
    options: RenderOptions,
) -> io::Result<()> {
    if item.extended && !options.verbose {
        return Ok(());
    }
    let indent = "  ".repeat(depth);
    if depth == 0 {
        writeln!(out, "{}{}", indent, summary_line(test_name, item))?;
    } else {
        writeln!(out, "{}{}", indent, item.msg)?;
    }
    if options.show_objects {
        for obj in &item.objects {
            writeln!(out, "{}  {}", indent, obj.text())?;
        }
    }
    for child in &item.children {
        render_text_item(out, test_name, child, depth + 1, options)?;
    }
    Ok(())
}

/// Render the machine-readable XML report; messages keep their optional
/// clause markers.
pub fn render_xml<W: Write>(
    out: &mut W,
    report: &DiscrepancyReport,
    options: RenderOptions,
) -> io::Result<()> {
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        out,
        r#"<discrepancy_report generated="{}">"#,
        xml_escape(&Local::now().format("%Y-%m-%d %H:%M:%S").to_string())
    )?;
    for test in &report.tests {
        writeln!(
            out,
            r#"  <test name="{}" code="{}" severity="{}" autofix="{}">"#,
            xml_escape(test.desc.name),
            test.desc.code,
            test.item.severity.as_str(),
            test.item.autofix,
        )?;
        for child in &test.item.children {
            render_xml_item(out, child, 2, options)?;
        }
        writeln!(out, "  </test>")?;
    }
    writeln!(out, "</discrepancy_report>")
}

fn render_xml_item<W: Write>(
    out: &mut W,
    item: &ReportItem,
    depth: usize,
    options: RenderOptions,
) -> io::Result<()> {
    if item.extended && !options.verbose {
        return Ok(());
    }
    let indent = "  ".repeat(depth);
    writeln!(
        out,
        r#"{}<details message="{}" severity="{}" cardinality="{}">"#,
        indent,
        xml_escape(&item.xml_msg),
        item.severity.as_str(),
        item.count,
    )?;
    if options.show_objects {
        for obj in &item.objects {
            writeln!(
                out,
                r#"{}  <object label="{}"/>"#,
                indent,
                xml_escape(obj.text())
            )?;
        }
    }
    for child in &item.children {
        render_xml_item(out, child, depth + 1, options)?;
    }
    writeln!(out, "{}</details>", indent)
}

/// Render the JSON report.
pub fn render_json<W: Write>(out: &mut W, report: &DiscrepancyReport) -> io::Result<()> {
    let value = json!({
        "generated": Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        "stats": {
            "files": report.stats.files,
            "records": report.stats.records,
            "bioseqs": report.stats.bioseq_count,
            "nucleotide": report.stats.na_count,
            "protein": report.stats.aa_count,
        },
        "tests": report.tests.iter().map(|t| json!({
            "name": t.desc.name,
            "code": t.desc.code,
            "description": t.desc.description,
            "report": t.item.to_json(),
        })).collect::<Vec<_>>(),
    });
    let rendered = serde_json::to_string_pretty(&value).map_err(io::Error::other)?;
    writeln!(out, "{}", rendered)
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

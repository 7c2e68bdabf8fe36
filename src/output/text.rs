//! Colored, severity-grouped terminal report (`spec.md` §6 "text (grouped
//! by severity)"). Styling follows the teacher's `output.rs`: `colored` for
//! the status pills, `comfy-table` for tabular findings.

use super::ScanInfo;
use crate::enrich::EnrichedDetection;
use crate::rules::ir::Severity;
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use std::io::Write;

const SEVERITIES: [Severity; 5] =
    [Severity::Critical, Severity::High, Severity::Medium, Severity::Low, Severity::Info];

fn severity_color(s: Severity) -> Color {
    match s {
        Severity::Critical => Color::Red,
        Severity::High => Color::Red,
        Severity::Medium => Color::Yellow,
        Severity::Low => Color::Blue,
        Severity::Info => Color::Grey,
    }
}

/// Renders `findings` as a colored report grouped by severity, followed by
/// a scan-info footer.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn render(writer: &mut impl Write, findings: &[EnrichedDetection], scan_info: &ScanInfo) -> anyhow::Result<()> {
    super::print_header(writer)?;

    if findings.is_empty() {
        writeln!(writer, "{}", "No findings.".green().bold())?;
    }

    for severity in SEVERITIES {
        let group: Vec<&EnrichedDetection> = findings.iter().filter(|f| f.rule.severity == severity).collect();
        if group.is_empty() {
            continue;
        }

        let label = format!(" {} ({}) ", severity.as_lowercase().to_uppercase(), group.len());
        writeln!(writer, "{}", label.on_color(severity_color(severity)).black().bold())?;

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Rule", "Location", "Sink", "Confidence"]);

        for finding in &group {
            table.add_row(vec![
                Cell::new(&finding.rule.id),
                Cell::new(format!("{}:{}", finding.location.rel_path, finding.location.line)),
                Cell::new(&finding.rule.name),
                Cell::new(format!("{:.2}", finding.confidence)),
            ]);
        }

        writeln!(writer, "{table}")?;
        writeln!(writer)?;
    }

    writeln!(
        writer,
        "{} {} files, {} functions, {} rules, {} findings in {}ms",
        "Scan summary:".bold(),
        scan_info.files_scanned,
        scan_info.functions_analyzed,
        scan_info.rules_loaded,
        findings.len(),
        scan_info.duration_ms
    )?;
    if scan_info.rule_errors > 0 {
        writeln!(
            writer,
            "{}",
            format!("{} rule(s) failed during execution and were skipped.", scan_info.rule_errors).yellow()
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::{Location, RuleInfo, Snippet};
    use crate::taint::DetectionType;
    use std::path::PathBuf;

    fn finding(severity: Severity) -> EnrichedDetection {
        EnrichedDetection {
            location: Location {
                file_path: PathBuf::from("a.py"),
                rel_path: "a.py".to_owned(),
                line: 10,
                column: 0,
                function: "app.handler".to_owned(),
            },
            snippet: Snippet::default(),
            rule: RuleInfo {
                id: "PY-SQLI-001".to_owned(),
                name: "SQL injection".to_owned(),
                severity,
                description: String::new(),
                cwe: vec![],
                owasp: vec![],
                references: vec![],
            },
            detection_type: DetectionType::Dataflow,
            confidence: 0.9,
            source_line: 5,
        }
    }

    #[test]
    fn renders_without_panicking_for_empty_and_populated() {
        let mut buf = Vec::new();
        let scan_info = ScanInfo {
            project_root: PathBuf::from("."),
            files_scanned: 1,
            functions_analyzed: 2,
            rules_loaded: 1,
            duration_ms: 5,
            rule_errors: 0,
        };
        render(&mut buf, &[], &scan_info).unwrap();
        assert!(String::from_utf8(buf).unwrap().contains("No findings"));

        let mut buf = Vec::new();
        render(&mut buf, &[finding(Severity::Critical)], &scan_info).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("PY-SQLI-001"));
        assert!(out.contains("CRITICAL"));
    }
}

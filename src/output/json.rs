//! `{summary, findings, scan_info}` JSON output (`spec.md` §6).

use super::ScanInfo;
use crate::enrich::EnrichedDetection;
use crate::rules::ir::Severity;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct JsonFinding<'a> {
    rule_id: &'a str,
    rule_name: &'a str,
    severity: &'static str,
    description: &'a str,
    cwe: &'a [String],
    owasp: &'a [String],
    file: &'a str,
    line: usize,
    column: usize,
    function: &'a str,
    source_line: usize,
    confidence: f32,
    detection_type: &'static str,
}

#[derive(Serialize)]
struct JsonSummary {
    total: usize,
    by_severity: FxHashMap<String, usize>,
}

#[derive(Serialize)]
struct JsonScanInfo<'a> {
    project_root: &'a str,
    files_scanned: usize,
    functions_analyzed: usize,
    rules_loaded: usize,
    duration_ms: u128,
    rule_errors: usize,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: JsonSummary,
    findings: Vec<JsonFinding<'a>>,
    scan_info: JsonScanInfo<'a>,
}

/// Renders `findings` as the `{summary, findings, scan_info}` JSON shape.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn render(writer: &mut impl Write, findings: &[EnrichedDetection], scan_info: &ScanInfo) -> anyhow::Result<()> {
    let mut by_severity = FxHashMap::default();
    for severity in [Severity::Critical, Severity::High, Severity::Medium, Severity::Low, Severity::Info] {
        let count = findings.iter().filter(|f| f.rule.severity == severity).count();
        by_severity.insert(severity.as_lowercase().to_owned(), count);
    }

    let project_root = scan_info.project_root.to_string_lossy();
    let report = JsonReport {
        summary: JsonSummary { total: findings.len(), by_severity },
        findings: findings
            .iter()
            .map(|f| JsonFinding {
                rule_id: &f.rule.id,
                rule_name: &f.rule.name,
                severity: f.rule.severity.as_lowercase(),
                description: &f.rule.description,
                cwe: &f.rule.cwe,
                owasp: &f.rule.owasp,
                file: &f.location.rel_path,
                line: f.location.line,
                column: f.location.column,
                function: &f.location.function,
                source_line: f.source_line,
                confidence: f.confidence,
                detection_type: match f.detection_type {
                    crate::taint::DetectionType::Dataflow => "dataflow",
                    crate::taint::DetectionType::Pattern => "pattern",
                },
            })
            .collect(),
        scan_info: JsonScanInfo {
            project_root: &project_root,
            files_scanned: scan_info.files_scanned,
            functions_analyzed: scan_info.functions_analyzed,
            rules_loaded: scan_info.rules_loaded,
            duration_ms: scan_info.duration_ms,
            rule_errors: scan_info.rule_errors,
        },
    };

    writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn renders_valid_json_with_expected_keys() {
        let mut buf = Vec::new();
        let scan_info = ScanInfo {
            project_root: PathBuf::from("/proj"),
            files_scanned: 3,
            functions_analyzed: 7,
            rules_loaded: 2,
            duration_ms: 42,
            rule_errors: 0,
        };
        render(&mut buf, &[], &scan_info).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert!(parsed.get("summary").is_some());
        assert!(parsed.get("findings").is_some());
        assert!(parsed.get("scan_info").is_some());
        assert_eq!(parsed["summary"]["total"], 0);
    }
}

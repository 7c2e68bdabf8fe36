//! SARIF 2.1.0 output (`spec.md` §6: "`runs[0].results` with location,
//! ruleId, message, snippet").

use super::ScanInfo;
use crate::enrich::EnrichedDetection;
use serde::Serialize;
use std::io::Write;

const SCHEMA_URL: &str = "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";
const VERSION: &str = "2.1.0";

#[derive(Serialize)]
struct SarifLog<'a> {
    #[serde(rename = "$schema")]
    schema: &'static str,
    version: &'static str,
    runs: Vec<SarifRun<'a>>,
}

#[derive(Serialize)]
struct SarifRun<'a> {
    tool: SarifTool,
    results: Vec<SarifResult<'a>>,
}

#[derive(Serialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize)]
struct SarifDriver {
    name: &'static str,
    version: &'static str,
    rules: Vec<SarifRuleDescriptor>,
}

#[derive(Serialize)]
struct SarifRuleDescriptor {
    id: String,
    name: String,
    #[serde(rename = "fullDescription")]
    full_description: SarifMessage,
    #[serde(rename = "defaultConfiguration")]
    default_configuration: SarifConfiguration,
}

#[derive(Serialize)]
struct SarifConfiguration {
    level: &'static str,
}

#[derive(Serialize)]
struct SarifResult<'a> {
    #[serde(rename = "ruleId")]
    rule_id: &'a str,
    level: &'static str,
    message: SarifMessage,
    locations: Vec<SarifLocation<'a>>,
}

#[derive(Serialize)]
struct SarifMessage {
    text: String,
}

#[derive(Serialize)]
struct SarifLocation<'a> {
    #[serde(rename = "physicalLocation")]
    physical_location: SarifPhysicalLocation<'a>,
}

#[derive(Serialize)]
struct SarifPhysicalLocation<'a> {
    #[serde(rename = "artifactLocation")]
    artifact_location: SarifArtifactLocation<'a>,
    region: SarifRegion,
}

#[derive(Serialize)]
struct SarifArtifactLocation<'a> {
    uri: &'a str,
}

#[derive(Serialize)]
struct SarifRegion {
    #[serde(rename = "startLine")]
    start_line: usize,
    #[serde(rename = "snippet", skip_serializing_if = "Option::is_none")]
    snippet: Option<SarifMessage>,
}

/// SARIF severity levels: `critical`/`high` map to `error`, `medium` to
/// `warning`, `low`/`info` to `note`.
fn sarif_level(severity: crate::rules::ir::Severity) -> &'static str {
    use crate::rules::ir::Severity;
    match severity {
        Severity::Critical | Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low | Severity::Info => "note",
    }
}

/// Renders `findings` as a SARIF 2.1.0 log with one run.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn render(writer: &mut impl Write, findings: &[EnrichedDetection], _scan_info: &ScanInfo) -> anyhow::Result<()> {
    let mut seen_rules = std::collections::HashSet::new();
    let mut rules = Vec::new();
    for f in findings {
        if seen_rules.insert(f.rule.id.clone()) {
            rules.push(SarifRuleDescriptor {
                id: f.rule.id.clone(),
                name: f.rule.name.clone(),
                full_description: SarifMessage { text: f.rule.description.clone() },
                default_configuration: SarifConfiguration { level: sarif_level(f.rule.severity) },
            });
        }
    }

    let results = findings
        .iter()
        .map(|f| SarifResult {
            rule_id: &f.rule.id,
            level: sarif_level(f.rule.severity),
            message: SarifMessage {
                text: format!("{} (confidence {:.2})", f.rule.name, f.confidence),
            },
            locations: vec![SarifLocation {
                physical_location: SarifPhysicalLocation {
                    artifact_location: SarifArtifactLocation { uri: &f.location.rel_path },
                    region: SarifRegion {
                        start_line: f.location.line,
                        snippet: f
                            .snippet
                            .lines
                            .iter()
                            .find(|l| l.is_highlight)
                            .map(|l| SarifMessage { text: l.content.clone() }),
                    },
                },
            }],
        })
        .collect();

    let log = SarifLog {
        schema: SCHEMA_URL,
        version: VERSION,
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver { name: "code-pathfinder", version: env!("CARGO_PKG_VERSION"), rules },
            },
            results,
        }],
    };

    writeln!(writer, "{}", serde_json::to_string_pretty(&log)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::{Location, RuleInfo, Snippet};
    use crate::rules::ir::Severity;
    use crate::taint::DetectionType;
    use std::path::PathBuf;

    #[test]
    fn renders_valid_sarif_with_results() {
        let finding = EnrichedDetection {
            location: Location {
                file_path: PathBuf::from("a.py"),
                rel_path: "a.py".to_owned(),
                line: 3,
                column: 0,
                function: "app.handler".to_owned(),
            },
            snippet: Snippet::default(),
            rule: RuleInfo {
                id: "PY-SQLI-001".to_owned(),
                name: "SQL injection".to_owned(),
                severity: Severity::Critical,
                description: "SQL injection via string concat".to_owned(),
                cwe: vec!["CWE-89".to_owned()],
                owasp: vec![],
                references: vec![],
            },
            detection_type: DetectionType::Dataflow,
            confidence: 0.9,
            source_line: 1,
        };

        let mut buf = Vec::new();
        let scan_info = ScanInfo {
            project_root: PathBuf::from("."),
            files_scanned: 1,
            functions_analyzed: 1,
            rules_loaded: 1,
            duration_ms: 1,
            rule_errors: 0,
        };
        render(&mut buf, &[finding], &scan_info).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed["version"], "2.1.0");
        assert_eq!(parsed["runs"][0]["results"][0]["ruleId"], "PY-SQLI-001");
        assert_eq!(parsed["runs"][0]["results"][0]["level"], "error");
    }
}

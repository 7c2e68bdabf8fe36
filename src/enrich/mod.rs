//! Enricher + diff filter (C7, `spec.md` §4.7).
//!
//! Turns a raw [`crate::taint::Detection`] into the full
//! [`EnrichedDetection`] record output formatters consume: project-relative
//! location, a ±N-line snippet with the sink line highlighted, and the
//! producing rule's metadata. The snippet-around-a-line idea is grounded in
//! the teacher's HTML report file-view generation, which already slices
//! source lines for display around a finding.

mod diff;
mod snippet;

pub use diff::{changed_files_from_git, ChangedFiles};
pub use snippet::{build_snippet, Snippet, SnippetLine};

use crate::rules::ir::{RuleIr, RuleMetadata, Severity};
use crate::taint::{Detection, DetectionType};
use crate::utils::normalize_display_path;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

/// Default number of context lines shown on each side of the highlighted
/// line (`spec.md` §4.7).
pub const DEFAULT_SNIPPET_CONTEXT: usize = 3;

/// A detection's location once it has been pinned to a project-relative
/// path (`spec.md` §3 `Enriched detection`).
#[derive(Debug, Clone)]
pub struct Location {
    /// Absolute file path.
    pub file_path: PathBuf,
    /// Path relative to the project root, forward-slash normalized.
    pub rel_path: String,
    /// 1-indexed line number.
    pub line: usize,
    /// 1-indexed column number; `0` when not tracked (container detections).
    pub column: usize,
    /// Enclosing function FQN, or the compose service name for container
    /// detections.
    pub function: String,
}

/// Rule metadata carried through to the enriched record (`spec.md` §3
/// `Enriched detection`).
#[derive(Debug, Clone)]
pub struct RuleInfo {
    /// Rule ID.
    pub id: String,
    /// Rule name.
    pub name: String,
    /// Normalized-to-lowercase severity (`spec.md` §9).
    pub severity: Severity,
    /// Prose description.
    pub description: String,
    /// CWE identifiers.
    pub cwe: Vec<String>,
    /// OWASP category identifiers.
    pub owasp: Vec<String>,
    /// Reference URLs/titles.
    pub references: Vec<String>,
}

/// A detection with location, snippet, and rule metadata attached
/// (`spec.md` §3 `Enriched detection`).
#[derive(Debug, Clone)]
pub struct EnrichedDetection {
    /// Where the sink was reached.
    pub location: Location,
    /// Source snippet around the sink line.
    pub snippet: Snippet,
    /// The producing rule's metadata.
    pub rule: RuleInfo,
    /// `dataflow` or `pattern`.
    pub detection_type: DetectionType,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Line the taint path began on (for dataflow detections, equals the
    /// first source's line; for container detections, equals `line`).
    pub source_line: usize,
}

impl EnrichedDetection {
    /// The `(rule.id, rel_path, line, function_fqn, source_line)`
    /// deduplication key (`spec.md` §8 property 4).
    #[must_use]
    pub fn dedup_key(&self) -> (String, String, usize, String, usize) {
        (
            self.rule.id.clone(),
            self.location.rel_path.clone(),
            self.location.line,
            self.location.function.clone(),
            self.source_line,
        )
    }
}

/// Enriches every `(rule_id, detections)` pair produced by the executor,
/// looks the file's source text for a snippet, deduplicates, and orders the
/// result by `(severity rank, rel_path, line)` (`spec.md` §4.7, §8 property
/// 8).
#[must_use]
pub fn enrich_all(
    detections: Vec<Detection>,
    rules_by_id: &FxHashMap<String, &RuleIr>,
    project_root: &Path,
    source_text: impl Fn(&Path) -> Option<String>,
) -> Vec<EnrichedDetection> {
    let mut seen = std::collections::HashSet::new();
    let mut out: Vec<EnrichedDetection> = Vec::new();

    for detection in detections {
        let Some(rule) = rules_by_id.get(&detection.rule_id) else { continue };
        let enriched = enrich_one(&detection, rule, project_root, &source_text);
        if seen.insert(enriched.dedup_key()) {
            out.push(enriched);
        }
    }

    out.sort_by(|a, b| {
        a.rule
            .severity
            .rank()
            .cmp(&b.rule.severity.rank())
            .then_with(|| a.location.rel_path.cmp(&b.location.rel_path))
            .then_with(|| a.location.line.cmp(&b.location.line))
    });

    out
}

fn enrich_one(
    detection: &Detection,
    rule: &RuleIr,
    project_root: &Path,
    source_text: &impl Fn(&Path) -> Option<String>,
) -> EnrichedDetection {
    let rel_path = detection
        .file
        .strip_prefix(project_root)
        .map(normalize_display_path_buf)
        .unwrap_or_else(|_| normalize_display_path(&detection.file));

    let text = source_text(&detection.file);
    let snippet = build_snippet(text.as_deref(), detection.sink_line, DEFAULT_SNIPPET_CONTEXT);

    let meta = rule.metadata();
    EnrichedDetection {
        location: Location {
            file_path: detection.file.clone(),
            rel_path,
            line: detection.sink_line,
            column: 0,
            function: detection.function_fqn.clone(),
        },
        snippet,
        rule: RuleInfo {
            id: rule.id().to_owned(),
            name: rule.name().to_owned(),
            severity: rule.severity(),
            description: meta.description.clone(),
            cwe: meta.cwe.clone(),
            owasp: meta.owasp.clone(),
            references: meta.references.clone(),
        },
        detection_type: detection.detection_type,
        confidence: detection.confidence,
        source_line: detection.source_line,
    }
}

fn normalize_display_path_buf(p: &Path) -> String {
    normalize_display_path(p)
}

/// Drops every detection whose `rel_path` is not in `changed`
/// (`spec.md` §4.7 "diff filter", §8 property 5). A `None` `changed` means
/// diff-aware mode is disabled and everything passes through.
#[must_use]
pub fn apply_diff_filter(
    detections: Vec<EnrichedDetection>,
    changed: Option<&ChangedFiles>,
) -> Vec<EnrichedDetection> {
    match changed {
        None => detections,
        Some(changed) => detections
            .into_iter()
            .filter(|d| changed.contains(&d.location.rel_path))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ir::{DataflowRule, RuleMetadata as IrMetadata, Severity as IrSeverity};
    use crate::taint::{DetectionScope, DetectionType as DType};

    fn dataflow_rule(id: &str, severity: IrSeverity) -> RuleIr {
        RuleIr::Dataflow(DataflowRule {
            id: id.to_owned(),
            name: "test rule".to_owned(),
            severity,
            sources: vec![],
            sinks: vec![],
            sanitizers: vec![],
            scope_hint: None,
            metadata: IrMetadata::default(),
        })
    }

    fn detection(rule_id: &str, file: &str, line: usize) -> Detection {
        Detection {
            function_fqn: "app.handler".to_owned(),
            file: PathBuf::from(file),
            source_line: line,
            sink_line: line,
            sink_call: "cursor.execute".to_owned(),
            tainted_var: Some("q".to_owned()),
            confidence: 0.9,
            scope: DetectionScope::Local,
            taint_path: None,
            detection_type: DType::Dataflow,
            rule_id: rule_id.to_owned(),
        }
    }

    #[test]
    fn enriches_and_orders_by_severity_then_path_then_line() {
        let critical = dataflow_rule("R-CRIT", IrSeverity::Critical);
        let low = dataflow_rule("R-LOW", IrSeverity::Low);
        let mut by_id = FxHashMap::default();
        by_id.insert("R-CRIT".to_owned(), &critical);
        by_id.insert("R-LOW".to_owned(), &low);

        let detections = vec![
            detection("R-LOW", "/proj/a.py", 5),
            detection("R-CRIT", "/proj/b.py", 10),
        ];

        let enriched = enrich_all(detections, &by_id, Path::new("/proj"), |_| None);
        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].rule.id, "R-CRIT");
        assert_eq!(enriched[1].rule.id, "R-LOW");
    }

    #[test]
    fn deduplicates_identical_keys() {
        let rule = dataflow_rule("R-1", IrSeverity::High);
        let mut by_id = FxHashMap::default();
        by_id.insert("R-1".to_owned(), &rule);

        let detections = vec![detection("R-1", "/proj/a.py", 5), detection("R-1", "/proj/a.py", 5)];
        let enriched = enrich_all(detections, &by_id, Path::new("/proj"), |_| None);
        assert_eq!(enriched.len(), 1);
    }

    #[test]
    fn diff_filter_keeps_only_changed_files_s5() {
        let rule = dataflow_rule("R-1", IrSeverity::High);
        let mut by_id = FxHashMap::default();
        by_id.insert("R-1".to_owned(), &rule);

        let detections = vec![
            detection("R-1", "/proj/a.py", 10),
            detection("R-1", "/proj/b.py", 20),
        ];
        let enriched = enrich_all(detections, &by_id, Path::new("/proj"), |_| None);

        let mut changed = ChangedFiles::default();
        changed.insert("a.py".to_owned());

        let filtered = apply_diff_filter(enriched, Some(&changed));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].location.rel_path, "a.py");
    }

    #[test]
    fn no_diff_filter_passes_everything_through() {
        let rule = dataflow_rule("R-1", IrSeverity::High);
        let mut by_id = FxHashMap::default();
        by_id.insert("R-1".to_owned(), &rule);
        let detections = vec![detection("R-1", "/proj/a.py", 10)];
        let enriched = enrich_all(detections, &by_id, Path::new("/proj"), |_| None);
        assert_eq!(apply_diff_filter(enriched, None).len(), 1);
    }
}

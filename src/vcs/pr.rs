//! Summary + inline PR comment managers (`spec.md` §4.9 "PR commenting").
//!
//! Both managers are idempotent: a marker embedded in the comment body
//! identifies "the comment this tool owns", so a second run on the same PR
//! updates in place instead of piling up duplicates (`spec.md` §8 property
//! 9). The inline manager additionally batches every new comment into one
//! review (`spec.md` §4.9 "atomic boundary") so a partial failure never
//! leaves half a scan's findings commented and half missing.

use crate::enrich::EnrichedDetection;
use crate::error::PathfinderError;
use crate::rules::ir::Severity;
use crate::vcs::github::GithubClient;

/// Marks the summary comment this tool owns, so re-runs update it in place.
pub const SUMMARY_MARKER: &str = "<!-- code-pathfinder-summary -->";

/// Posts or updates the single PR summary comment (`spec.md` §4.9).
pub struct SummaryCommentManager<'a> {
    client: &'a GithubClient,
}

impl<'a> SummaryCommentManager<'a> {
    /// Wraps `client` for summary-comment operations.
    #[must_use]
    pub fn new(client: &'a GithubClient) -> Self {
        Self { client }
    }

    /// Upserts the summary comment on `pr_number` with a markdown body built
    /// from `findings`.
    ///
    /// # Errors
    ///
    /// Propagates any [`PathfinderError::Network`] from the underlying
    /// GitHub API calls.
    pub fn upsert(&self, pr_number: u64, findings: &[EnrichedDetection]) -> Result<(), PathfinderError> {
        let body = build_summary_body(findings);
        let existing = self
            .client
            .list_issue_comments(pr_number)?
            .into_iter()
            .find(|c| c.body.contains(SUMMARY_MARKER));

        match existing {
            Some(comment) => self.client.update_issue_comment(comment.id, &body),
            None => self.client.create_issue_comment(pr_number, &body),
        }
    }
}

/// Builds the summary comment's markdown body: a status line, per-severity
/// count badges, and a findings table sorted by severity then location.
#[must_use]
pub fn build_summary_body(findings: &[EnrichedDetection]) -> String {
    let mut counts = [0usize; 5];
    for f in findings {
        counts[f.rule.severity.rank() as usize] += 1;
    }

    let status = if findings.is_empty() { "no findings" } else { "findings reported" };
    let mut body = String::new();
    body.push_str(SUMMARY_MARKER);
    body.push_str("\n## code-pathfinder scan\n\n");
    body.push_str(&format!("**Status:** {status}\n\n"));
    body.push_str(&format!(
        "critical: {} · high: {} · medium: {} · low: {} · info: {}\n\n",
        counts[0], counts[1], counts[2], counts[3], counts[4]
    ));

    if findings.is_empty() {
        body.push_str("No issues found in the changed files.\n");
        return body;
    }

    body.push_str("| Severity | Rule | Location | Message |\n");
    body.push_str("|---|---|---|---|\n");
    for f in findings {
        body.push_str(&format!(
            "| {} | {} | `{}:{}` | {} |\n",
            f.rule.severity, f.rule.id, f.location.rel_path, f.location.line, f.rule.name
        ));
    }

    body.push_str(&format!("\n{} finding(s) total.\n", findings.len()));
    body
}

/// Marker embedding a finding's identity so re-runs recognize "this is the
/// same finding" rather than posting a duplicate inline comment.
fn inline_marker(rule_id: &str, rel_path: &str, line: usize) -> String {
    format!("<!-- cpf-{rule_id}-{rel_path}-{line} -->")
}

/// Posts/updates inline review comments for high-severity findings
/// (`spec.md` §4.9).
pub struct InlineCommentManager<'a> {
    client: &'a GithubClient,
}

impl<'a> InlineCommentManager<'a> {
    /// Wraps `client` for inline-comment operations.
    #[must_use]
    pub fn new(client: &'a GithubClient) -> Self {
        Self { client }
    }

    /// Filters `findings` down to inline-eligible ones, updates comments
    /// that already exist, and batches every genuinely new one into a
    /// single review on `pr_number` (`spec.md` §4.9 "atomic boundary").
    ///
    /// # Errors
    ///
    /// Propagates any [`PathfinderError::Network`] from the underlying
    /// GitHub API calls.
    pub fn upsert(&self, pr_number: u64, findings: &[EnrichedDetection]) -> Result<(), PathfinderError> {
        let eligible: Vec<&EnrichedDetection> = findings.iter().filter(|f| is_inline_eligible(f)).collect();
        if eligible.is_empty() {
            return Ok(());
        }

        let existing = self.client.list_review_comments(pr_number)?;
        let mut new_comments = Vec::new();

        for finding in eligible {
            let marker = inline_marker(&finding.rule.id, &finding.location.rel_path, finding.location.line);
            let body = build_inline_body(finding, &marker);

            let already = existing.iter().find(|c| c.body.contains(&marker));
            match already {
                Some(comment) => {
                    self.client.update_review_comment(comment.id, &body)?;
                }
                None => {
                    new_comments.push((
                        finding.location.rel_path.clone(),
                        finding.location.line as u64,
                        body,
                    ));
                }
            }
        }

        if !new_comments.is_empty() {
            let head_sha = self.client.pr_head_sha(pr_number)?;
            self.client.create_review_with_comments(pr_number, &head_sha, &new_comments)?;
        }

        Ok(())
    }
}

/// Inline comments are reserved for the severities worth interrupting a
/// reviewer over, and only when the finding has a concrete file/line to
/// anchor to (`spec.md` §4.9).
fn is_inline_eligible(finding: &EnrichedDetection) -> bool {
    matches!(finding.rule.severity, Severity::Critical | Severity::High)
        && !finding.location.rel_path.is_empty()
        && finding.location.line > 0
}

fn build_inline_body(finding: &EnrichedDetection, marker: &str) -> String {
    format!(
        "{marker}\n**{}** ({}) — {}\n\n{}",
        finding.rule.severity, finding.rule.id, finding.rule.name, finding.rule.description
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::{Location, RuleInfo, Snippet};
    use crate::taint::DetectionType;
    use std::path::PathBuf;

    fn finding(rule_id: &str, severity: Severity, rel_path: &str, line: usize) -> EnrichedDetection {
        EnrichedDetection {
            location: Location {
                file_path: PathBuf::from(rel_path),
                rel_path: rel_path.to_owned(),
                line,
                column: 0,
                function: "app.handler".to_owned(),
            },
            snippet: Snippet::default(),
            rule: RuleInfo {
                id: rule_id.to_owned(),
                name: "test rule".to_owned(),
                severity,
                description: "description".to_owned(),
                cwe: vec![],
                owasp: vec![],
                references: vec![],
            },
            detection_type: DetectionType::Dataflow,
            confidence: 0.9,
            source_line: line,
        }
    }

    #[test]
    fn summary_body_contains_marker_and_counts() {
        let findings = vec![
            finding("R-1", Severity::Critical, "a.py", 1),
            finding("R-2", Severity::Low, "b.py", 2),
        ];
        let body = build_summary_body(&findings);
        assert!(body.starts_with(SUMMARY_MARKER));
        assert!(body.contains("critical: 1"));
        assert!(body.contains("low: 1"));
        assert!(body.contains("a.py:1"));
    }

    #[test]
    fn summary_body_reports_no_findings() {
        let body = build_summary_body(&[]);
        assert!(body.contains("No issues found"));
    }

    #[test]
    fn inline_eligibility_excludes_low_severity_and_missing_location() {
        let critical = finding("R-1", Severity::Critical, "a.py", 10);
        let low = finding("R-2", Severity::Low, "a.py", 10);
        let no_line = finding("R-3", Severity::High, "a.py", 0);
        assert!(is_inline_eligible(&critical));
        assert!(!is_inline_eligible(&low));
        assert!(!is_inline_eligible(&no_line));
    }

    #[test]
    fn inline_marker_is_stable_for_same_finding() {
        let a = inline_marker("R-1", "a.py", 10);
        let b = inline_marker("R-1", "a.py", 10);
        assert_eq!(a, b);
    }
}

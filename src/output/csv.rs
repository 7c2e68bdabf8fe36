//! Flat CSV output, one row per finding (`spec.md` §6).

use crate::enrich::EnrichedDetection;
use std::io::Write;

const HEADER: &str = "rule_id,severity,file,line,function,confidence,detection_type";

fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

/// Renders `findings` as flat CSV, one row per finding, severity/path/line
/// order preserved from the already-sorted input.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn render(writer: &mut impl Write, findings: &[EnrichedDetection]) -> anyhow::Result<()> {
    writeln!(writer, "{HEADER}")?;
    for f in findings {
        let detection_type = match f.detection_type {
            crate::taint::DetectionType::Dataflow => "dataflow",
            crate::taint::DetectionType::Pattern => "pattern",
        };
        writeln!(
            writer,
            "{},{},{},{},{},{:.2},{}",
            escape(&f.rule.id),
            f.rule.severity.as_lowercase(),
            escape(&f.location.rel_path),
            f.location.line,
            escape(&f.location.function),
            f.confidence,
            detection_type
        )?;
    }
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
    fn renders_header_and_one_row_per_finding() {
        let finding = EnrichedDetection {
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
                severity: Severity::Critical,
                description: String::new(),
                cwe: vec![],
                owasp: vec![],
                references: vec![],
            },
            detection_type: DetectionType::Dataflow,
            confidence: 0.85,
            source_line: 1,
        };

        let mut buf = Vec::new();
        render(&mut buf, &[finding]).unwrap();
        let out = String::from_utf8(buf).unwrap();
        let mut lines = out.lines();
        assert_eq!(lines.next().unwrap(), HEADER);
        assert_eq!(lines.next().unwrap(), "PY-SQLI-001,critical,a.py,10,app.handler,0.85,dataflow");
    }

    #[test]
    fn escapes_commas_in_fields() {
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("plain"), "plain");
    }
}

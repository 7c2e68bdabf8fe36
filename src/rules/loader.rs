//! Rule loader (`spec.md` §4.5, first half).
//!
//! Accepts a rules path (file or directory) and returns every `RuleIr`
//! record found in it. A malformed rule file is recorded as a load error
//! and skipped; it never aborts the scan (`spec.md` §7 "rule-execution").

use crate::rules::ir::{DataflowRule, PatternRule, RuleIr};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// One rule file's top-level shape: the `rule_type` tag discriminates
/// dataflow vs. pattern rules, matching `spec.md` §3's "Rule IR" framing.
/// This is the opaque DSL surface's on-disk encoding (`spec.md` §1) — YAML
/// chosen as the serialization the loader accepts, grounded in the pack's
/// `serde_yaml` usage elsewhere (see `DESIGN.md`).
#[derive(Debug, Deserialize)]
#[serde(tag = "rule_type", rename_all = "snake_case")]
enum RuleFile {
    /// A dataflow (taint) rule.
    Dataflow(DataflowRule),
    /// A container pattern rule.
    Pattern(PatternRule),
}

impl From<RuleFile> for RuleIr {
    fn from(value: RuleFile) -> Self {
        match value {
            RuleFile::Dataflow(r) => RuleIr::Dataflow(r),
            RuleFile::Pattern(r) => RuleIr::Pattern(r),
        }
    }
}

/// A rule file that failed to load. Recorded, never fatal.
#[derive(Debug, Clone)]
pub struct LoadError {
    /// File that failed to parse.
    pub file: PathBuf,
    /// Parser-reported message.
    pub message: String,
}

/// Loads every rule file under `path` (a single file or a directory walked
/// recursively for `.yml`/`.yaml` files).
#[must_use]
pub fn load_rules(path: &Path) -> (Vec<RuleIr>, Vec<LoadError>) {
    let mut rules = Vec::new();
    let mut errors = Vec::new();

    for file in collect_rule_files(path) {
        match load_one(&file) {
            Ok(rule) => rules.push(rule),
            Err(message) => errors.push(LoadError { file, message }),
        }
    }

    (rules, errors)
}

fn collect_rule_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let is_yaml = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext == "yml" || ext == "yaml");
        if is_yaml {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    files
}

fn load_one(file: &Path) -> Result<RuleIr, String> {
    let content = std::fs::read_to_string(file).map_err(|e| e.to_string())?;
    let rule_file: RuleFile = serde_yaml::from_str(&content).map_err(|e| e.to_string())?;
    Ok(rule_file.into())
}

/// Loads rules from every rule source that a scan configured: a local path
/// (file or directory), plus any number of already-materialized directories
/// (e.g. extracted remote bundles or individually resolved rule files from
/// C8). Errors from any one source are merged, never fatal.
#[must_use]
pub fn load_all(local_path: Option<&Path>, extra_dirs: &[PathBuf]) -> (Vec<RuleIr>, Vec<LoadError>) {
    let mut rules = Vec::new();
    let mut errors = Vec::new();

    if let Some(path) = local_path {
        let (r, e) = load_rules(path);
        rules.extend(r);
        errors.extend(e);
    }
    for dir in extra_dirs {
        let (r, e) = load_rules(dir);
        rules.extend(r);
        errors.extend(e);
    }

    (rules, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_dataflow_rule() -> anyhow::Result<()> {
        let temp = tempdir()?;
        std::fs::write(
            temp.path().join("sqli.yaml"),
            r#"
rule_type: dataflow
id: PY-SQLI-001
name: SQL injection via string concatenation
severity: critical
sources:
  - "request.args.get"
sinks:
  - "*.execute"
sanitizers:
  - "escape"
"#,
        )?;

        let (rules, errors) = load_rules(temp.path());
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id(), "PY-SQLI-001");
        Ok(())
    }

    #[test]
    fn loads_pattern_rule() -> anyhow::Result<()> {
        let temp = tempdir()?;
        std::fs::write(
            temp.path().join("user.yaml"),
            r#"
rule_type: pattern
id: DOCKER-NO-USER
name: Missing USER instruction
severity: high
file_pattern: "*Dockerfile*"
matcher:
  type: missing_instruction
  kind: USER
"#,
        )?;

        let (rules, errors) = load_rules(temp.path());
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(rules.len(), 1);
        assert!(matches!(rules[0], RuleIr::Pattern(_)));
        Ok(())
    }

    #[test]
    fn malformed_rule_is_recorded_not_fatal() -> anyhow::Result<()> {
        let temp = tempdir()?;
        std::fs::write(temp.path().join("bad.yaml"), "not: [valid, rule")?;
        std::fs::write(
            temp.path().join("good.yaml"),
            "rule_type: dataflow\nid: X-1\nname: x\nseverity: low\nsources: []\nsinks: []\n",
        )?;

        let (rules, errors) = load_rules(temp.path());
        assert_eq!(rules.len(), 1);
        assert_eq!(errors.len(), 1);
        Ok(())
    }
}

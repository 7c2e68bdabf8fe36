//! End-to-end tests driving the `pathfinder` binary (`SPEC_FULL.md` §1.4).
//!
//! Unit tests at the module level already cover the taint engine, the
//! container matcher, enrichment ordering/dedup/diff-filtering, and the
//! remote-bundle integrity/zip-slip checks individually (`spec.md` §8
//! scenarios S1-S7). These tests exercise the wiring those unit tests can't:
//! CLI parsing, pipeline orchestration, output rendering, and exit codes.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn pathfinder() -> Command {
    Command::cargo_bin("pathfinder").expect("pathfinder binary should build")
}

#[test]
fn scan_reports_sql_injection_and_exits_nonzero_on_fail_on() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(
        temp.path().join("app.py"),
        r#"
def handler():
    u = request.args.get("q")
    q = "SELECT * WHERE x=" + u
    cursor.execute(q)
"#,
    )
    .unwrap();

    let rules_dir = temp.path().join("rules");
    fs::create_dir_all(&rules_dir).unwrap();
    fs::write(
        rules_dir.join("sqli.yaml"),
        r#"
rule_type: dataflow
id: TEST-SQLI-001
name: SQL injection
severity: critical
sources:
  - "request.args.get"
sinks:
  - "cursor.execute"
sanitizers: []
"#,
    )
    .unwrap();

    pathfinder()
        .args([
            "scan",
            "--project",
            temp.path().to_str().unwrap(),
            "--rules",
            rules_dir.to_str().unwrap(),
            "--output",
            "json",
            "--fail-on",
            "critical",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("TEST-SQLI-001"));
}

#[test]
fn scan_with_no_fail_on_exits_zero_even_with_findings() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(
        temp.path().join("app.py"),
        r#"
def handler():
    u = request.args.get("q")
    q = "SELECT * WHERE x=" + u
    cursor.execute(q)
"#,
    )
    .unwrap();

    let rules_dir = temp.path().join("rules");
    fs::create_dir_all(&rules_dir).unwrap();
    fs::write(
        rules_dir.join("sqli.yaml"),
        "rule_type: dataflow\nid: TEST-SQLI-002\nname: x\nseverity: critical\nsources: [\"request.args.get\"]\nsinks: [\"cursor.execute\"]\nsanitizers: []\n",
    )
    .unwrap();

    pathfinder()
        .args([
            "scan",
            "--project",
            temp.path().to_str().unwrap(),
            "--rules",
            rules_dir.to_str().unwrap(),
            "--output",
            "json",
        ])
        .assert()
        .code(0);
}

#[test]
fn scan_reports_dockerfile_missing_user_s3() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("Dockerfile"), "FROM ubuntu:latest\n").unwrap();

    pathfinder()
        .args(["scan", "--project", temp.path().to_str().unwrap(), "--output", "json"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("PF-DOCKER-NO-USER"));
}

#[test]
fn scan_on_empty_project_fails_with_no_rules_or_empty_project_error() {
    let temp = tempfile::tempdir().unwrap();

    pathfinder()
        .args(["scan", "--project", temp.path().to_str().unwrap(), "--output", "json"])
        .assert()
        .code(1);
}

#[test]
fn ci_falls_back_to_full_scan_when_no_git_repo_present() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("Dockerfile"), "FROM ubuntu:latest\n").unwrap();

    pathfinder()
        .args(["ci", "--project", temp.path().to_str().unwrap(), "--output", "json"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("PF-DOCKER-NO-USER"));
}

#[test]
fn version_prints_crate_version() {
    pathfinder()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("code-pathfinder"));
}

#[test]
fn csv_output_has_header_row() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("Dockerfile"), "FROM ubuntu:latest\n").unwrap();

    pathfinder()
        .args(["scan", "--project", temp.path().to_str().unwrap(), "--output", "csv"])
        .assert()
        .code(0)
        .stdout(predicate::str::starts_with("rule_id,severity,file,line,function,confidence,detection_type"));
}

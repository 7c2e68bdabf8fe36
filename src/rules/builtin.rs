//! The engine's bundled default ruleset.
//!
//! The teacher ships its security checks as hardcoded `impl Rule` structs
//! (`rules/danger/{code_execution,injection,deserialization,crypto,
//! network,filesystem}.rs`) rather than data loaded from a rule file.
//! `spec.md` §1 treats the rule DSL as an opaque external collaborator and
//! this engine's loader (`rules::loader`) only understands the YAML `RuleIr`
//! encoding — so the teacher's hardcoded sink/source/sanitizer patterns are
//! preserved here as literal `RuleIr` values instead, giving every scan a
//! usable ruleset with no `--rules`/`--ruleset` flag required, the same way
//! the teacher's `get_danger_rules()` always runs when `--danger` is passed.

use crate::rules::ir::{DataflowRule, Matcher, PatternRule, RuleIr, RuleMetadata, Severity};

fn meta(description: &str, cwe: &[&str], owasp: &[&str]) -> RuleMetadata {
    RuleMetadata {
        description: description.to_owned(),
        cwe: cwe.iter().map(|s| (*s).to_owned()).collect(),
        owasp: owasp.iter().map(|s| (*s).to_owned()).collect(),
        references: Vec::new(),
    }
}

fn pat(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

/// The common web-framework taint sources every built-in dataflow rule
/// shares, grounded in the teacher's `TaintSource::{FlaskRequest,
/// DjangoRequest, FastApiParam}` variants (`taint/types.rs`, now folded
/// into plain callee patterns).
fn web_sources() -> Vec<String> {
    pat(&[
        "request.args.get",
        "request.args.*",
        "request.form.get",
        "request.form.*",
        "request.values.get",
        "request.data",
        "request.json",
        "request.cookies.get",
        "request.GET.get",
        "request.POST.get",
        "request.COOKIES.get",
        "*.get_json",
        "*.get_body",
        "*.route_params",
        "input",
        "sys.argv",
        "os.environ.get",
        "os.getenv",
    ])
}

/// Every `RuleIr` the engine bundles when no `--rules`/`--ruleset` is
/// supplied (`SPEC_FULL.md` §2.5).
#[must_use]
pub fn builtin_rules() -> Vec<RuleIr> {
    let mut rules = vec![
        RuleIr::Dataflow(DataflowRule {
            id: "PF-SQLI-001".to_owned(),
            name: "SQL injection via string-built query".to_owned(),
            severity: Severity::Critical,
            sources: web_sources(),
            sinks: pat(&["*.execute", "*.executemany", "sqlalchemy.text", "*.text"]),
            sanitizers: pat(&["escape", "html.escape", "markupsafe.escape"]),
            scope_hint: Some("web".to_owned()),
            metadata: meta(
                "Tainted input reaches a SQL execution sink without parameterization.",
                &["CWE-89"],
                &["A03:2021"],
            ),
        }),
        RuleIr::Dataflow(DataflowRule {
            id: "PF-CODE-EXEC-001".to_owned(),
            name: "Code injection via eval/exec".to_owned(),
            severity: Severity::Critical,
            sources: web_sources(),
            sinks: pat(&["eval", "exec", "compile"]),
            sanitizers: pat(&["ast.literal_eval"]),
            scope_hint: None,
            metadata: meta(
                "Tainted input reaches eval()/exec()/compile().",
                &["CWE-95"],
                &["A03:2021"],
            ),
        }),
        RuleIr::Dataflow(DataflowRule {
            id: "PF-CMDI-001".to_owned(),
            name: "OS command injection".to_owned(),
            severity: Severity::Critical,
            sources: web_sources(),
            sinks: pat(&[
                "os.system",
                "os.popen",
                "subprocess.run",
                "subprocess.call",
                "subprocess.Popen",
                "subprocess.check_output",
                "asyncio.create_subprocess_shell",
                "pty.spawn",
            ]),
            sanitizers: pat(&["shlex.quote", "shlex.split"]),
            scope_hint: None,
            metadata: meta(
                "Tainted input reaches a subprocess/shell execution sink.",
                &["CWE-78"],
                &["A03:2021"],
            ),
        }),
        RuleIr::Dataflow(DataflowRule {
            id: "PF-DESER-001".to_owned(),
            name: "Insecure deserialization of untrusted data".to_owned(),
            severity: Severity::Critical,
            sources: web_sources(),
            sinks: pat(&[
                "pickle.loads",
                "pickle.load",
                "cPickle.loads",
                "dill.loads",
                "shelve.open",
                "jsonpickle.decode",
                "yaml.load",
                "marshal.loads",
            ]),
            sanitizers: Vec::new(),
            scope_hint: None,
            metadata: meta(
                "Tainted bytes reach an unsafe deserializer (pickle/yaml.load/marshal).",
                &["CWE-502"],
                &["A08:2021"],
            ),
        }),
        RuleIr::Dataflow(DataflowRule {
            id: "PF-SSRF-001".to_owned(),
            name: "Server-side request forgery".to_owned(),
            severity: Severity::High,
            sources: web_sources(),
            sinks: pat(&[
                "requests.get",
                "requests.post",
                "requests.request",
                "urllib.request.urlopen",
                "httpx.get",
                "httpx.post",
            ]),
            sanitizers: Vec::new(),
            scope_hint: Some("web".to_owned()),
            metadata: meta(
                "Tainted URL/host reaches an outbound HTTP request.",
                &["CWE-918"],
                &["A10:2021"],
            ),
        }),
        RuleIr::Dataflow(DataflowRule {
            id: "PF-PATH-001".to_owned(),
            name: "Path traversal via tainted filename".to_owned(),
            severity: Severity::High,
            sources: web_sources(),
            sinks: pat(&["open", "os.open", "pathlib.Path", "shutil.copy", "shutil.move"]),
            sanitizers: pat(&["os.path.basename", "secure_filename"]),
            scope_hint: None,
            metadata: meta(
                "Tainted path component reaches a filesystem operation unsanitized.",
                &["CWE-22"],
                &["A01:2021"],
            ),
        }),
        RuleIr::Dataflow(DataflowRule {
            id: "PF-XSS-001".to_owned(),
            name: "Reflected cross-site scripting".to_owned(),
            severity: Severity::High,
            sources: web_sources(),
            sinks: pat(&[
                "flask.render_template_string",
                "flask.Markup",
                "format_html",
                "HTMLResponse",
            ]),
            sanitizers: pat(&["escape", "markupsafe.escape", "bleach.clean"]),
            scope_hint: Some("web".to_owned()),
            metadata: meta(
                "Tainted input reaches an HTML response without escaping.",
                &["CWE-79"],
                &["A03:2021"],
            ),
        }),
    ];

    rules.extend(builtin_container_rules());
    rules
}

/// The container-configuration side of the bundled default ruleset
/// (`spec.md` §4.6), covering the two scenarios `spec.md` §8 names (S3, S4).
#[must_use]
fn builtin_container_rules() -> Vec<RuleIr> {
    vec![
        RuleIr::Pattern(PatternRule {
            id: "PF-DOCKER-NO-USER".to_owned(),
            name: "Dockerfile never switches away from root".to_owned(),
            severity: Severity::High,
            file_pattern: "*Dockerfile*".to_owned(),
            matcher: Matcher::MissingInstruction {
                kind: "USER".to_owned(),
            },
            metadata: meta(
                "No USER instruction: the container runs as root by default.",
                &["CWE-250"],
                &["A05:2021"],
            ),
        }),
        RuleIr::Pattern(PatternRule {
            id: "PF-DOCKER-LATEST-NO-USER".to_owned(),
            name: "Floating base image tag with no non-root user".to_owned(),
            severity: Severity::Medium,
            file_pattern: "*Dockerfile*".to_owned(),
            matcher: Matcher::AllOf {
                conditions: vec![
                    Matcher::Instruction {
                        kind: "FROM".to_owned(),
                        image_tag: Some("latest".to_owned()),
                        user_name: None,
                        arg_name_regex: None,
                        contains: None,
                        not_contains: None,
                        port_less_than: None,
                        port_greater_than: None,
                        missing_digest: None,
                        base_image: None,
                    },
                    Matcher::MissingInstruction {
                        kind: "USER".to_owned(),
                    },
                ],
            },
            metadata: meta(
                "FROM pins no digest and uses the floating `latest` tag, and the image runs as root.",
                &["CWE-1104"],
                &["A05:2021"],
            ),
        }),
        RuleIr::Pattern(PatternRule {
            id: "PF-COMPOSE-PRIVILEGED".to_owned(),
            name: "Compose service runs privileged".to_owned(),
            severity: Severity::Critical,
            file_pattern: "docker-compose*.y*ml".to_owned(),
            matcher: Matcher::ServiceHas {
                key: "privileged".to_owned(),
                equals: Some("true".to_owned()),
                contains: None,
                contains_any: None,
            },
            metadata: meta(
                "A compose service runs with `privileged: true`.",
                &["CWE-250"],
                &["A05:2021"],
            ),
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rules_have_unique_ids() {
        let rules = builtin_rules();
        let mut ids: Vec<&str> = rules.iter().map(RuleIr::id).collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn builtin_rules_nonempty_for_both_kinds() {
        let rules = builtin_rules();
        assert!(rules.iter().any(|r| matches!(r, RuleIr::Dataflow(_))));
        assert!(rules.iter().any(|r| matches!(r, RuleIr::Pattern(_))));
    }
}

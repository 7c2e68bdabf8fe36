//! Pipeline orchestration for `scan`/`ci`/`diagnose`/`resolution-report`
//! (`spec.md` §2 "Control flow", §6).

use super::options::ScanArgs;
use crate::callgraph::{self, CallGraph};
use crate::enrich::{self, ChangedFiles, EnrichedDetection};
use crate::error::PathfinderError;
use crate::module_registry::ModuleRegistry;
use crate::output::{self, OutputFormat, ScanInfo};
use crate::remote::{spec as ruleset_spec, RulesetResolver, RulesetSpec};
use crate::rules::executor::{discover_container_graphs, execute_rules};
use crate::rules::ir::{RuleIr, Severity};
use crate::rules::loader;
use crate::source::build_source_graph;
use crate::taint::bodies::BodyIndex;
use crate::taint::engine::DEFAULT_MAX_DEPTH;
use crate::vcs::baseline::resolve_baseline_ref;
use crate::vcs::git::GitChangeProvider;
use crate::vcs::github::{GithubChangeProvider, GithubClient};
use crate::vcs::pr::{InlineCommentManager, SummaryCommentManager};
use crate::vcs::ChangeProvider;
use rustc_hash::FxHashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one pipeline run: the enriched, filtered findings ready for a
/// formatter, plus the scan-info footer every format reports.
struct PipelineResult {
    findings: Vec<EnrichedDetection>,
    scan_info: ScanInfo,
}

/// Resolves the rule sources configured on `args` (local path, remote
/// rulesets) into one loaded `RuleIr` list (C8 then C5, `spec.md` §2).
/// Remote failures are logged as warnings and the scan continues with
/// whatever sources did resolve, since a degraded ruleset is better than no
/// scan (`spec.md` §7: network errors are never fatal to the overall scan
/// except the offending bundle's contribution).
fn resolve_rules(args: &ScanArgs) -> Vec<RuleIr> {
    let mut rules = crate::rules::builtin::builtin_rules();
    let (local_rules, local_errors) = loader::load_all(args.rules.as_deref(), &[]);
    for e in &local_errors {
        warn!(file = %e.file.display(), message = %e.message, "rule file failed to load");
    }
    rules.extend(local_rules);

    if args.rulesets.is_empty() {
        return rules;
    }

    let resolver = RulesetResolver::new(args.ruleset_base_url.clone(), args.refresh_rules);
    let mut bundle_dirs = Vec::new();
    let mut rule_files = Vec::new();

    for raw in &args.rulesets {
        let parsed = match ruleset_spec::parse(raw) {
            Ok(p) => p,
            Err(e) => {
                warn!(spec = %raw, error = %e, "invalid ruleset spec, skipping");
                continue;
            }
        };

        let outcome = match &parsed {
            RulesetSpec::RuleId { language, rule_id } => {
                resolver.resolve_rule_id_via_cache(language, rule_id).map(|f| {
                    rule_files.push(f);
                })
            }
            _ => resolver.resolve(&parsed).map(|dirs| bundle_dirs.extend(dirs)),
        };

        if let Err(e) = outcome {
            warn!(spec = %raw, error = %e, "failed to resolve remote ruleset, skipping");
        }
    }

    if !bundle_dirs.is_empty() || !rule_files.is_empty() {
        match RulesetResolver::materialize(&bundle_dirs, &rule_files) {
            Ok(combined) => {
                let (remote_rules, remote_errors) = loader::load_rules(&combined);
                for e in &remote_errors {
                    warn!(file = %e.file.display(), message = %e.message, "downloaded rule file failed to load");
                }
                rules.extend(remote_rules);
            }
            Err(e) => warn!(error = %e, "failed to materialize resolved rulesets"),
        }
    }

    rules
}

/// Computes the diff-aware changed-file set, if requested. `fatal` controls
/// whether an unresolvable base ref aborts the scan (`--diff-aware` on
/// `scan`) or degrades to a full-scan warning (`ci`'s default diff-aware
/// behavior, `spec.md` §8 "Boundary behaviors").
fn compute_changed_files(args: &ScanArgs, fatal: bool) -> Result<Option<ChangedFiles>, PathfinderError> {
    if !args.diff_aware {
        return Ok(None);
    }

    let provider: Box<dyn ChangeProvider> = if let (Some(token), Some(repo), Some(pr)) =
        (&args.github_token, &args.github_repo, args.github_pr)
    {
        let (owner, name) = repo.split_once('/').ok_or_else(|| {
            PathfinderError::Validation(format!("--github-repo '{repo}' must be 'owner/repo'"))
        })?;
        Box::new(GithubChangeProvider::new(token.clone(), owner.to_owned(), name.to_owned(), pr))
    } else {
        let base = args
            .base
            .clone()
            .or_else(resolve_baseline_ref)
            .ok_or_else(|| PathfinderError::Vcs("no base ref configured and none could be auto-detected".to_owned()))?;
        let head = args.head.clone().unwrap_or_else(|| "HEAD".to_owned());
        Box::new(GitChangeProvider { repo_root: args.project.clone(), base, head })
    };

    match provider.changed_files() {
        Ok(changed) => Ok(Some(changed)),
        Err(e) if fatal => Err(e),
        Err(e) => {
            warn!(error = %e, "diff-aware baseline could not be resolved, falling back to a full scan");
            Ok(None)
        }
    }
}

/// Runs the full pipeline once: C1 → C2 → C3 → (C8+C5) → C4+C6 → merge →
/// C7 (`spec.md` §2 "Control flow").
fn run_pipeline(args: &ScanArgs, diff_fatal: bool) -> Result<PipelineResult, PathfinderError> {
    let started = Instant::now();
    let mut discovered_total = 0usize;

    let source_graph = build_source_graph(
        &args.project,
        &args.exclude_folders,
        &args.include_folders,
        args.skip_tests,
        |total| {
            discovered_total = total;
            info!(target: "progress", total, "discovered source files");
        },
        || {},
    );
    for e in &source_graph.parse_errors {
        debug!(file = %e.file.display(), message = %e.message, "source file failed to parse");
    }

    let module_registry = ModuleRegistry::build(&source_graph)?;
    let call_graph = callgraph::build_call_graph(&source_graph, &module_registry);
    info!(
        target: "statistic",
        functions = call_graph.functions.len(),
        edges = call_graph.edges.len(),
        "call graph built"
    );

    let rules = resolve_rules(args);
    if rules.is_empty() {
        return Err(PathfinderError::NoRules(
            "no rules loaded from --rules/--ruleset and the built-in ruleset produced nothing".to_owned(),
        ));
    }

    let bodies = BodyIndex::build(&source_graph);
    let (container_graphs, container_errors) = discover_container_graphs(&args.project);
    for e in &container_errors {
        debug!(error = %e, "container file failed to parse");
    }

    let runs = execute_rules(&rules, &call_graph, &bodies, &container_graphs, DEFAULT_MAX_DEPTH);
    let rule_errors = runs.iter().filter(|r| r.error.is_some()).count();
    for run in &runs {
        if let Some(err) = &run.error {
            warn!(rule = %err.rule_id, message = %err.message, "rule execution failed, skipped");
        }
    }

    if runs.iter().all(|r| r.detections.is_empty()) && container_graphs.is_empty() && call_graph.functions.is_empty() {
        return Err(PathfinderError::NoRules(
            "no rules produced any detection capability and no container files were found".to_owned(),
        ));
    }

    let rules_by_id: FxHashMap<String, &RuleIr> = rules.iter().map(|r| (r.id().to_owned(), r)).collect();
    let all_detections = runs.into_iter().flat_map(|r| r.detections).collect();

    let project_root = args.project.clone();
    let enriched = enrich::enrich_all(all_detections, &rules_by_id, &project_root, |path| {
        std::fs::read_to_string(path).ok()
    });

    let changed = compute_changed_files(args, diff_fatal)?;
    let findings = enrich::apply_diff_filter(enriched, changed.as_ref());

    let scan_info = ScanInfo {
        project_root,
        files_scanned: source_graph.nodes.len(),
        functions_analyzed: call_graph.functions.len(),
        rules_loaded: rules.len(),
        duration_ms: started.elapsed().as_millis(),
        rule_errors,
    };

    Ok(PipelineResult { findings, scan_info })
}

/// Posts PR comments if requested (`spec.md` §4.9). Network failures
/// degrade to warnings; they never affect the scan's exit code (`spec.md`
/// §7).
fn post_pr_comments(args: &ScanArgs, findings: &[EnrichedDetection]) {
    if !args.pr_comment && !args.pr_inline {
        return;
    }
    let (Some(token), Some(repo), Some(pr)) = (&args.github_token, &args.github_repo, args.github_pr) else {
        warn!("--pr-comment/--pr-inline requires --github-token, --github-repo, and --github-pr");
        return;
    };
    let Some((owner, name)) = repo.split_once('/') else {
        warn!(repo = %repo, "--github-repo must be 'owner/repo'");
        return;
    };

    let client = GithubClient::new(token.clone(), owner.to_owned(), name.to_owned());

    if args.pr_comment {
        if let Err(e) = SummaryCommentManager::new(&client).upsert(pr, findings) {
            warn!(error = %e, "failed to post PR summary comment");
        }
    }
    if args.pr_inline {
        if let Err(e) = InlineCommentManager::new(&client).upsert(pr, findings) {
            warn!(error = %e, "failed to post PR inline comments");
        }
    }
}

/// Severities that cause a non-zero exit, matched case-insensitively
/// (`spec.md` §6, §9).
fn any_fail_on_match(findings: &[EnrichedDetection], fail_on: &[Severity]) -> bool {
    !fail_on.is_empty() && findings.iter().any(|f| fail_on.contains(&f.rule.severity))
}

fn write_output(args: &ScanArgs, result: &PipelineResult) -> anyhow::Result<()> {
    match &args.output_file {
        Some(path) => {
            let validated = crate::utils::validate_output_path(path, None)?;
            let mut file = std::fs::File::create(&validated)?;
            output::render(&mut file, args.output, &result.findings, &result.scan_info)
        }
        None => {
            let mut stdout = std::io::stdout();
            output::render(&mut stdout, args.output, &result.findings, &result.scan_info)
        }
    }
}

/// `pathfinder scan`: diff-aware-on-flag, fatal on an unresolvable base ref
/// when `--diff-aware` was explicitly requested (`spec.md` §8).
///
/// Returns the process exit code (`spec.md` §6: 0 success, 1 fail-on/fatal).
#[must_use]
pub fn scan(args: &ScanArgs) -> i32 {
    match run_pipeline(args, args.diff_aware) {
        Ok(result) => {
            post_pr_comments(args, &result.findings);
            let fail = any_fail_on_match(&result.findings, &args.fail_on);
            if let Err(e) = write_output(args, &result) {
                eprintln!("error writing output: {e}");
                return 1;
            }
            i32::from(fail)
        }
        Err(e) => {
            eprintln!("scan failed: {e}");
            1
        }
    }
}

/// `pathfinder ci`: diff-aware by default unless `--no-diff`; an
/// unresolvable base ref degrades to a full scan with a warning rather than
/// aborting (`spec.md` §8).
#[must_use]
pub fn ci(args: &ScanArgs) -> i32 {
    match run_pipeline(args, false) {
        Ok(result) => {
            post_pr_comments(args, &result.findings);
            let fail = any_fail_on_match(&result.findings, &args.fail_on);
            if let Err(e) = write_output(args, &result) {
                eprintln!("error writing output: {e}");
                return 1;
            }
            i32::from(fail)
        }
        Err(e) => {
            eprintln!("ci scan failed: {e}");
            1
        }
    }
}

/// `pathfinder diagnose`: prints the call-graph resolution breakdown
/// (resolved/unresolved call sites by `failure_reason`) without running any
/// rules, to help a user understand why a dataflow rule isn't firing.
#[must_use]
pub fn diagnose(args: &ScanArgs) -> i32 {
    let source_graph = build_source_graph(&args.project, &args.exclude_folders, &args.include_folders, args.skip_tests, |_| {}, || {});
    let module_registry = match ModuleRegistry::build(&source_graph) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("diagnose failed: {e}");
            return 1;
        }
    };
    let call_graph = callgraph::build_call_graph(&source_graph, &module_registry);
    print_diagnosis(&call_graph);
    0
}

fn print_diagnosis(call_graph: &CallGraph) {
    let mut total = 0usize;
    let mut resolved = 0usize;
    let mut by_reason: FxHashMap<String, usize> = FxHashMap::default();

    for sites in call_graph.call_sites.values() {
        for site in sites {
            total += 1;
            if site.resolved {
                resolved += 1;
            } else if let Some(reason) = site.failure_reason {
                *by_reason.entry(format!("{reason:?}")).or_insert(0) += 1;
            }
        }
    }

    println!("functions: {}", call_graph.functions.len());
    println!("call sites: {total} ({resolved} resolved)");
    for (reason, count) in by_reason {
        println!("  {reason}: {count}");
    }
}

/// `pathfinder resolution-report`: per-module resolution statistics,
/// machine-readable as JSON.
#[must_use]
pub fn resolution_report(args: &ScanArgs) -> i32 {
    let source_graph = build_source_graph(&args.project, &args.exclude_folders, &args.include_folders, args.skip_tests, |_| {}, || {});
    let module_registry = match ModuleRegistry::build(&source_graph) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("resolution-report failed: {e}");
            return 1;
        }
    };
    let call_graph = callgraph::build_call_graph(&source_graph, &module_registry);

    let report = serde_json::json!({
        "modules": module_registry.len(),
        "functions": call_graph.functions.len(),
        "edges": call_graph.edges.len(),
        "call_sites": call_graph.call_sites.values().map(Vec::len).sum::<usize>(),
        "resolved": call_graph.call_sites.values().flatten().filter(|s| s.resolved).count(),
    });

    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            println!("{json}");
            0
        }
        Err(e) => {
            eprintln!("resolution-report failed: {e}");
            1
        }
    }
}

/// `pathfinder version`: prints the crate version.
pub fn version() {
    println!("code-pathfinder {}", env!("CARGO_PKG_VERSION"));
}

/// `pathfinder serve`: the MCP/HTTP server transport is an external
/// collaborator out of this engine's scope (`spec.md` §1). The CLI surface
/// still names the subcommand; this build reports that clearly rather than
/// silently doing nothing.
#[must_use]
pub fn serve() -> i32 {
    eprintln!("serve: the MCP/HTTP transport is not part of this engine build; run the analysis library behind your own server instead.");
    1
}

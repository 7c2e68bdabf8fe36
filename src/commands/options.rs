//! Shared options struct for `scan`/`ci`, assembled from CLI flags and
//! config-file defaults (`spec.md` §6 "Shared flags for scanning").

use crate::output::OutputFormat;
use crate::rules::ir::Severity;
use std::path::PathBuf;

/// Everything the scan pipeline needs, independent of where it came from
/// (CLI flags, `.pathfinder.toml`, or a test harness).
#[derive(Debug, Clone)]
pub struct ScanArgs {
    /// Project root to scan.
    pub project: PathBuf,
    /// Local rules path (`--rules`).
    pub rules: Option<PathBuf>,
    /// Remote ruleset specs (`--ruleset`, repeatable).
    pub rulesets: Vec<String>,
    /// Base URL remote ruleset manifests are fetched from.
    pub ruleset_base_url: String,
    /// Invalidate cached bundles before resolving (`--refresh-rules`).
    pub refresh_rules: bool,
    /// Output format (`--output`).
    pub output: OutputFormat,
    /// Output file, `None` means stdout (`--output-file`).
    pub output_file: Option<PathBuf>,
    /// Verbose logging (`--verbose`).
    pub verbose: bool,
    /// Debug logging (`--debug`).
    pub debug: bool,
    /// Severities that cause a non-zero exit (`--fail-on`).
    pub fail_on: Vec<Severity>,
    /// Skip recognized test files (`--skip-tests`).
    pub skip_tests: bool,
    /// Enable diff-aware scanning (`--diff-aware` on `scan`, the default
    /// unless `--no-diff` on `ci`).
    pub diff_aware: bool,
    /// Explicit base ref (`--base`).
    pub base: Option<String>,
    /// Explicit head ref (`--head`).
    pub head: Option<String>,
    /// GitHub token (`--github-token`).
    pub github_token: Option<String>,
    /// `owner/repo` (`--github-repo`).
    pub github_repo: Option<String>,
    /// PR number (`--github-pr`).
    pub github_pr: Option<u64>,
    /// Post a PR summary comment (`--pr-comment`).
    pub pr_comment: bool,
    /// Post inline PR review comments (`--pr-inline`).
    pub pr_inline: bool,
    /// Extra folders to exclude.
    pub exclude_folders: Vec<String>,
    /// Folders to force-include.
    pub include_folders: Vec<String>,
}

impl Default for ScanArgs {
    fn default() -> Self {
        Self {
            project: PathBuf::from("."),
            rules: None,
            rulesets: Vec::new(),
            ruleset_base_url: crate::remote::DEFAULT_RULESET_BASE_URL.to_owned(),
            refresh_rules: false,
            output: OutputFormat::Text,
            output_file: None,
            verbose: false,
            debug: false,
            fail_on: Vec::new(),
            skip_tests: false,
            diff_aware: false,
            base: None,
            head: None,
            github_token: None,
            github_repo: None,
            github_pr: None,
            pr_comment: false,
            pr_inline: false,
            exclude_folders: Vec::new(),
            include_folders: Vec::new(),
        }
    }
}

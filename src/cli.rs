use crate::commands::ScanArgs;
use crate::output::OutputFormat;
use crate::rules::ir::Severity;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Help text shown at the bottom of --help, describing the config-file
/// fallback every scanning subcommand honors.
const CONFIG_HELP: &str = "\
CONFIGURATION FILE (.pathfinder.toml or [tool.pathfinder] in pyproject.toml):
  Create either file in your project root to set defaults for the flags
  below. CLI flags always take precedence over the config file.

  [pathfinder]
  rules = \"./rules\"              # Local rule directory
  rulesets = [\"python/all\"]       # Remote ruleset specs
  output = \"text\"                 # text | json | sarif | csv
  fail_on = [\"critical\", \"high\"]  # Severities that cause a non-zero exit
  skip_tests = false
  diff_aware = false
  exclude_folders = [\"build\", \"dist\", \".venv\"]
  include_folders = []
  github_repo = \"owner/repo\"
  pr_comment = false
  pr_inline = false
";

/// Flags shared by every subcommand that runs a scan (`scan`, `ci`).
#[derive(Args, Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct ScanFlags {
    /// Project root to scan.
    #[arg(long, default_value = ".")]
    pub project: PathBuf,

    /// Local rule directory or single rule file.
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Remote ruleset spec, repeatable: `category/bundle`, `category/all`,
    /// or `language/RULE-ID`.
    #[arg(long = "ruleset")]
    pub rulesets: Vec<String>,

    /// Base URL remote ruleset manifests are fetched from.
    #[arg(long, default_value = "https://rulesets.codepathfinder.dev")]
    pub ruleset_base_url: String,

    /// Invalidate cached rulesets before resolving, forcing a re-download.
    #[arg(long)]
    pub refresh_rules: bool,

    /// Output format.
    #[arg(long, value_parser = parse_output_format, default_value = "text")]
    pub output: OutputFormat,

    /// Write output to this file instead of stdout.
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    /// Verbose logging (file discovery, rule resolution detail).
    #[arg(short, long)]
    pub verbose: bool,

    /// Debug logging (per-call-site resolution detail).
    #[arg(long)]
    pub debug: bool,

    /// Exit with code 1 if any finding has one of these severities,
    /// repeatable or comma-separated.
    #[arg(long, value_delimiter = ',', value_parser = parse_severity)]
    pub fail_on: Vec<Severity>,

    /// Skip files recognized as test code.
    #[arg(long)]
    pub skip_tests: bool,

    /// Explicit base ref for diff-aware scanning.
    #[arg(long)]
    pub base: Option<String>,

    /// Explicit head ref for diff-aware scanning.
    #[arg(long)]
    pub head: Option<String>,

    /// GitHub token for the PR-files API and PR commenting.
    #[arg(long, env = "GITHUB_TOKEN")]
    pub github_token: Option<String>,

    /// `owner/repo` the current scan belongs to.
    #[arg(long)]
    pub github_repo: Option<String>,

    /// Pull request number to restrict/annotate the scan against.
    #[arg(long)]
    pub github_pr: Option<u64>,

    /// Post (or update) a single PR summary comment.
    #[arg(long)]
    pub pr_comment: bool,

    /// Post inline PR review comments for each finding on a changed line.
    #[arg(long)]
    pub pr_inline: bool,

    /// Additional folders to exclude, beyond the built-in defaults.
    #[arg(long, alias = "exclude-folder")]
    pub exclude_folders: Vec<String>,

    /// Folders to force-include, overriding default exclusions.
    #[arg(long, alias = "include-folder")]
    pub include_folders: Vec<String>,
}

fn parse_output_format(s: &str) -> Result<OutputFormat, String> {
    OutputFormat::parse(s).ok_or_else(|| format!("invalid output format '{s}': expected text, json, sarif, or csv"))
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    Severity::parse(s).ok_or_else(|| format!("invalid severity '{s}'"))
}

impl ScanFlags {
    /// Converts parsed CLI flags into the pipeline's internal options,
    /// resolving `diff_aware` separately since `scan` and `ci` default it
    /// differently, and filling anything left at its CLI default from the
    /// project's `.pathfinder.toml`/`pyproject.toml` config (`spec.md` §6:
    /// CLI flags always take precedence over the config file).
    #[must_use]
    pub fn into_scan_args(self, diff_aware: bool) -> ScanArgs {
        let config = crate::config::Config::load_from_path(&self.project).pathfinder;

        let rules = self.rules.or_else(|| config.rules.map(PathBuf::from));
        let rulesets = if self.rulesets.is_empty() { config.rulesets } else { self.rulesets };
        let output = if matches!(self.output, OutputFormat::Text) {
            config
                .output
                .as_deref()
                .and_then(OutputFormat::parse)
                .unwrap_or(self.output)
        } else {
            self.output
        };
        let fail_on = if self.fail_on.is_empty() {
            config.fail_on.iter().filter_map(|s| Severity::parse(s)).collect()
        } else {
            self.fail_on
        };
        let skip_tests = self.skip_tests || config.skip_tests.unwrap_or(false);
        let diff_aware = diff_aware || config.diff_aware.unwrap_or(false);
        let github_repo = self.github_repo.or(config.github_repo);
        let pr_comment = self.pr_comment || config.pr_comment.unwrap_or(false);
        let pr_inline = self.pr_inline || config.pr_inline.unwrap_or(false);
        let mut exclude_folders = self.exclude_folders;
        exclude_folders.extend(config.exclude_folders);
        let mut include_folders = self.include_folders;
        include_folders.extend(config.include_folders);

        ScanArgs {
            project: self.project,
            rules,
            rulesets,
            ruleset_base_url: self.ruleset_base_url,
            refresh_rules: self.refresh_rules,
            output,
            output_file: self.output_file,
            verbose: self.verbose,
            debug: self.debug,
            fail_on,
            skip_tests,
            diff_aware,
            base: self.base,
            head: self.head,
            github_token: self.github_token,
            github_repo,
            github_pr: self.github_pr,
            pr_comment,
            pr_inline,
            exclude_folders,
            include_folders,
        }
    }
}

/// `code-pathfinder`: a static-analysis engine for Python that builds an
/// inter-procedural call graph and runs taint and container rules against
/// it.
#[derive(Parser, Debug)]
#[command(name = "pathfinder", author, version, about, long_about = None, after_help = CONFIG_HELP)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a one-off scan.
    Scan {
        #[command(flatten)]
        flags: ScanFlags,

        /// Restrict findings to lines changed since `--base` (auto-detects
        /// the baseline ref if not given).
        #[arg(long)]
        diff_aware: bool,
    },
    /// Run a scan tuned for CI: diff-aware by default, degrading to a full
    /// scan with a warning if the baseline ref can't be resolved.
    Ci {
        #[command(flatten)]
        flags: ScanFlags,

        /// Disable diff-aware filtering and scan the whole project.
        #[arg(long)]
        no_diff: bool,
    },
    /// Print call-graph resolution statistics without running any rules.
    Diagnose {
        #[command(flatten)]
        flags: ScanFlags,
    },
    /// Print a machine-readable resolution report as JSON.
    ResolutionReport {
        #[command(flatten)]
        flags: ScanFlags,
    },
    /// Start a long-running server transport (not implemented in this
    /// build; use the library directly for embedding).
    Serve,
    /// Print the engine's version.
    Version,
}

//! Output formatters (`spec.md` §6 "Output formats").
//!
//! The engine's analysis stages never write to stdout directly; the CLI
//! boundary picks exactly one formatter — [`text`], [`json`], [`sarif`], or
//! [`csv`] — as "the single writer of findings" (`spec.md` §7), writing
//! either to stdout or `--output-file`. Styling (spinner, colored summary
//! pills, box-drawn header) is grounded in the teacher's `output.rs`, which
//! already uses `colored`/`comfy-table`/`indicatif` for exactly this kind of
//! CLI report.

/// Flat CSV, one row per finding.
pub mod csv;
/// `{summary, findings, scan_info}` JSON.
pub mod json;
/// SARIF 2.1.0.
pub mod sarif;
/// Colored, severity-grouped terminal report.
pub mod text;

use crate::enrich::EnrichedDetection;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

/// Output format selected by `--output` (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Colored terminal report grouped by severity.
    Text,
    /// `{summary, findings, scan_info}`.
    Json,
    /// SARIF 2.1.0.
    Sarif,
    /// Flat CSV.
    Csv,
}

impl OutputFormat {
    /// Parses `--output`'s value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            "sarif" => Some(Self::Sarif),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// Scan-level metadata every format's footer/`scan_info` block reports.
#[derive(Debug, Clone)]
pub struct ScanInfo {
    /// Project root that was scanned.
    pub project_root: PathBuf,
    /// Number of source files parsed.
    pub files_scanned: usize,
    /// Number of functions in the resolved call graph.
    pub functions_analyzed: usize,
    /// Number of rules that ran (dataflow + pattern).
    pub rules_loaded: usize,
    /// Wall-clock duration of the scan, in milliseconds.
    pub duration_ms: u128,
    /// Number of rule-execution errors recorded (never fatal; `spec.md`
    /// §7).
    pub rule_errors: usize,
}

/// Renders `findings` in `format` to `writer`.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails, or (SARIF/JSON) if
/// serialization fails.
pub fn render(
    writer: &mut impl Write,
    format: OutputFormat,
    findings: &[EnrichedDetection],
    scan_info: &ScanInfo,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => text::render(writer, findings, scan_info),
        OutputFormat::Json => json::render(writer, findings, scan_info),
        OutputFormat::Sarif => sarif::render(writer, findings, scan_info),
        OutputFormat::Csv => csv::render(writer, findings),
    }
}

/// Creates a spinner for the "analyzing" phase. Hidden under `cfg!(test)` so
/// test output stays clean, matching the teacher's `create_spinner`.
#[must_use]
pub fn create_spinner() -> ProgressBar {
    if cfg!(test) {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("pathfinder: building call graph…");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Prints the box-drawn header for the text format's interactive mode.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn print_header(writer: &mut impl Write) -> std::io::Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{}", "╔════════════════════════════════════════╗".cyan())?;
    writeln!(writer, "{}", "║  code-pathfinder scan results           ║".cyan().bold())?;
    writeln!(writer, "{}", "╚════════════════════════════════════════╝".cyan())?;
    writeln!(writer)?;
    Ok(())
}

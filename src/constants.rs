//! Shared constants and regex patterns used across the pipeline.

use regex::Regex;
use rustc_hash::FxHashSet;
use std::sync::OnceLock;

/// Regex for identifying Python test files (`spec.md` §6).
///
/// # Panics
///
/// Panics if the regex pattern is invalid.
pub fn get_test_file_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| {
        Regex::new(
            r"(?:^|[/\\])tests?[/\\]|(?:^|[/\\])test_[^/\\]+\.py$|[^/\\]+_test\.py$|conftest\.py$",
        )
        .expect("invalid test file regex pattern")
    })
}

/// Regex for recognizing framework entry-point files (views/routes/handlers),
/// used by the call-graph failure-categorization pass to bias toward
/// `external_framework` rather than `unknown_symbol`.
///
/// # Panics
///
/// Panics if the regex pattern is invalid.
pub fn get_framework_file_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:views|handlers|endpoints|routes|api|urls)\.py$")
            .expect("invalid framework file regex pattern")
    })
}

/// Directories skipped by the source-graph walk regardless of `.gitignore`
/// contents: vendor, build output, VCS metadata, and virtual environments.
pub fn get_default_exclude_folders() -> &'static FxHashSet<&'static str> {
    static SET: OnceLock<FxHashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| {
        [
            "__pycache__",
            ".git",
            ".pytest_cache",
            ".mypy_cache",
            ".tox",
            ".ruff_cache",
            "htmlcov",
            "build",
            "dist",
            "node_modules",
            "venv",
            ".venv",
            "target",
        ]
        .into_iter()
        .collect()
    })
}

/// Callee-prefixes recognized as external framework entry points for the
/// call-graph's `external_framework` failure-reason heuristic (`spec.md`
/// §4.3 pass 5). Grounded in the teacher's `framework.rs`
/// `FRAMEWORK_DECORATORS` set, narrowed to the subset that corresponds to
/// unresolved *callees* rather than decorator-only usages.
pub fn get_external_framework_prefixes() -> &'static [&'static str] {
    &[
        "flask.",
        "django.",
        "fastapi.",
        "starlette.",
        "rest_framework.",
        "azure.functions.",
        "celery.",
        "pydantic.",
    ]
}

pub use get_default_exclude_folders as DEFAULT_EXCLUDE_FOLDERS;
pub use get_external_framework_prefixes as EXTERNAL_FRAMEWORK_PREFIXES;
pub use get_framework_file_re as FRAMEWORK_FILE_RE;
pub use get_test_file_re as TEST_FILE_RE;

//! Typed error kinds for the analysis pipeline.
//!
//! Each component that can fail in a user-meaningful way produces one of
//! these instead of a bare `anyhow::Error`; the CLI boundary wraps them with
//! `anyhow::Context` to add the surrounding operation.

use std::path::PathBuf;

/// Top-level error kind, matching the `spec.md` §7 error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum PathfinderError {
    /// Bad flags, malformed ruleset spec, invalid severity name.
    #[error("validation error: {0}")]
    Validation(String),

    /// A file could not be read.
    #[error("io error reading {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed source, YAML, or Dockerfile.
    #[error("parse error in {path}: {message}")]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Parser-reported message.
        message: String,
    },

    /// Non-2xx HTTP response or request timeout.
    #[error("network error: {0}")]
    Network(String),

    /// Checksum or byte-size mismatch on a downloaded bundle. Fatal for that
    /// bundle, not for the overall scan.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// A zip entry resolved outside its extraction root. Fatal for that
    /// bundle, not for the overall scan.
    #[error("security error: {0}")]
    Security(String),

    /// Invalid git ref, or the working directory is not a repository.
    #[error("vcs error: {0}")]
    Vcs(String),

    /// No recognized source file in the project root.
    #[error("empty project: no recognized source files under {0}")]
    EmptyProject(PathBuf),

    /// No rule produced any detection capability (no rules loaded, no
    /// container detections available).
    #[error("no rules loaded: {0}")]
    NoRules(String),
}

/// Per-call-site resolution failure recorded on a `CallSite`, never fatal.
/// Kept separate from `PathfinderError` because it is data, not a failure of
/// the pipeline itself (see `spec.md` §4.3 pass 5 and §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveFailureReason {
    /// Callee prefix matches a known external framework (Flask, Django, …).
    ExternalFramework,
    /// Callee looks like an ORM query builder (`.objects.`, `.filter(`).
    OrmPattern,
    /// Receiver type was inferred but the method wasn't found on it.
    VariableMethod,
    /// Callee was bound through `getattr`/`setattr`-style reflection.
    DynamicDispatch,
    /// No heuristic matched.
    UnknownSymbol,
}

/// A single rule's execution failure. Recorded and skipped, never aborts
/// the scan (`spec.md` §7, §5).
#[derive(Debug, Clone)]
pub struct RuleExecutionError {
    /// ID of the rule that failed.
    pub rule_id: String,
    /// Human-readable failure message.
    pub message: String,
}

impl std::fmt::Display for RuleExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rule {} failed: {}", self.rule_id, self.message)
    }
}

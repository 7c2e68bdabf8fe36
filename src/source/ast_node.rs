//! The per-file unit the source graph builder produces.

use crate::source::Language;
use crate::utils::LineIndex;
use std::path::PathBuf;

/// One parsed source file.
///
/// `spec.md` §3 describes a generic `{kind, name, file, line, column,
/// children, raw_text, ...}` AST node record; here that's realized as the
/// file's real `ruff_python_ast::ModModule` tree (the module registry and
/// call-graph builder walk it directly) plus the bookkeeping every later
/// stage needs: the raw source text (for snippets), a [`LineIndex`] (for
/// byte-offset-to-line conversion), and a parse-error marker so one bad file
/// never aborts the scan (`spec.md` §4.1).
#[derive(Debug)]
pub struct SourceNode {
    /// Absolute path to the file.
    pub file_path: PathBuf,
    /// Language this file was recognized as.
    pub language: Language,
    /// Raw source text, kept for snippet extraction (C7).
    pub raw_text: String,
    /// Byte-offset to line-number converter for this file.
    pub line_index: LineIndex,
    /// The parsed module, if parsing succeeded.
    pub module: Option<ruff_python_ast::ModModule>,
    /// Parse error message, if parsing failed. The file still gets a
    /// `SourceNode` (with `module: None`) so downstream stages can report
    /// the error without losing track of the file.
    pub parse_error: Option<String>,
}

impl SourceNode {
    /// Whether this file parsed successfully.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.parse_error.is_none()
    }
}

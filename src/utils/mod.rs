//! Utility functions shared across the pipeline.

mod paths;

pub use paths::{
    collect_source_files_gitignore, is_excluded, normalize_display_path, validate_output_path,
    validate_path_within_root,
};

use crate::constants::{FRAMEWORK_FILE_RE, TEST_FILE_RE};
use ruff_text_size::TextSize;

/// Converts byte offsets (as produced by the AST parser) to 1-indexed line
/// numbers, which is what every output format and PR comment reports.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Builds a `LineIndex` by scanning `source` for newlines. Byte iteration
    /// is safe here because `\n` is always a single byte in UTF-8.
    #[must_use]
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in source.as_bytes().iter().enumerate() {
            if *byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Converts a byte offset to a 1-indexed line number.
    #[must_use]
    pub fn line_index(&self, offset: TextSize) -> usize {
        let offset = offset.to_usize();
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line + 1,
            Err(line) => line,
        }
    }
}

/// Checks if a path matches the test-file patterns from `spec.md` §6.
#[must_use]
pub fn is_test_path(p: &str) -> bool {
    TEST_FILE_RE().is_match(p)
}

/// Checks if a path matches the framework entry-point patterns (views,
/// routes, handlers, …).
#[must_use]
pub fn is_framework_path(p: &str) -> bool {
    FRAMEWORK_FILE_RE().is_match(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruff_text_size::TextSize;

    #[test]
    fn line_index_finds_line_starts() {
        let idx = LineIndex::new("a = 1\nb = 2\nc = 3\n");
        assert_eq!(idx.line_index(TextSize::from(0)), 1);
        assert_eq!(idx.line_index(TextSize::from(6)), 2);
        assert_eq!(idx.line_index(TextSize::from(12)), 3);
    }

    #[test]
    fn recognizes_test_paths() {
        assert!(is_test_path("pkg/tests/test_foo.py"));
        assert!(is_test_path("pkg/test_bar.py"));
        assert!(is_test_path("pkg/bar_test.py"));
        assert!(is_test_path("pkg/conftest.py"));
        assert!(!is_test_path("pkg/app.py"));
    }
}

//! ±N-line snippet extraction with sink-line highlighting (`spec.md` §4.7).

/// One line of a snippet.
#[derive(Debug, Clone)]
pub struct SnippetLine {
    /// 1-indexed line number.
    pub number: usize,
    /// Line content, without trailing newline.
    pub content: String,
    /// Whether this is the highlighted (sink) line.
    pub is_highlight: bool,
}

/// A source snippet around a detection's sink line (`spec.md` §3
/// `Enriched detection.snippet`).
#[derive(Debug, Clone, Default)]
pub struct Snippet {
    /// Every line in the window, in source order.
    pub lines: Vec<SnippetLine>,
    /// 1-indexed first line in the window.
    pub start_line: usize,
    /// 1-indexed line that is highlighted.
    pub highlight_line: usize,
}

/// Builds a snippet around `highlight_line` with `context` lines on each
/// side. `source` is `None` when the file's text couldn't be recovered (a
/// container file read failure, or a synthetic test detection) — the
/// snippet is then empty but still carries `highlight_line` for callers
/// that only need the line number.
#[must_use]
pub fn build_snippet(source: Option<&str>, highlight_line: usize, context: usize) -> Snippet {
    let Some(source) = source else {
        return Snippet { lines: Vec::new(), start_line: highlight_line, highlight_line };
    };

    let all_lines: Vec<&str> = source.lines().collect();
    if all_lines.is_empty() || highlight_line == 0 {
        return Snippet { lines: Vec::new(), start_line: highlight_line, highlight_line };
    }

    let start = highlight_line.saturating_sub(context).max(1);
    let end = (highlight_line + context).min(all_lines.len());

    let lines = (start..=end)
        .filter_map(|n| {
            all_lines.get(n - 1).map(|content| SnippetLine {
                number: n,
                content: (*content).to_owned(),
                is_highlight: n == highlight_line,
            })
        })
        .collect();

    Snippet { lines, start_line: start, highlight_line }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_window_around_highlight_line() {
        let source = "l1\nl2\nl3\nl4\nl5\nl6\nl7\n";
        let snippet = build_snippet(Some(source), 4, 2);
        assert_eq!(snippet.start_line, 2);
        assert_eq!(snippet.lines.len(), 5);
        assert!(snippet.lines.iter().find(|l| l.number == 4).unwrap().is_highlight);
    }

    #[test]
    fn clamps_window_at_file_boundaries() {
        let source = "l1\nl2\nl3\n";
        let snippet = build_snippet(Some(source), 1, 3);
        assert_eq!(snippet.start_line, 1);
        assert_eq!(snippet.lines.len(), 3);
    }

    #[test]
    fn missing_source_yields_empty_snippet() {
        let snippet = build_snippet(None, 10, 3);
        assert!(snippet.lines.is_empty());
        assert_eq!(snippet.highlight_line, 10);
    }
}

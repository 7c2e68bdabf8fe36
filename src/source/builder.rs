//! Project walk + parse (`spec.md` §4.1).

use super::{Language, SourceNode};
use crate::utils::{LineIndex, collect_source_files_gitignore, is_test_path};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// A localized parse failure. The file still gets a [`SourceNode`] (with
/// `module: None`); the scan continues.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// File that failed to parse.
    pub file: PathBuf,
    /// Parser-reported message.
    pub message: String,
}

/// The collection of parsed source files for one scan.
#[derive(Debug, Default)]
pub struct SourceGraph {
    /// Project root the walk started from.
    pub root: PathBuf,
    /// One node per recognized, non-skipped source file.
    pub nodes: Vec<SourceNode>,
    /// Files that failed to parse (also present in `nodes` with
    /// `module: None`).
    pub parse_errors: Vec<ParseError>,
}

impl SourceGraph {
    /// Iterates over successfully parsed Python modules, with their node.
    pub fn python_modules(&self) -> impl Iterator<Item = &SourceNode> {
        self.nodes
            .iter()
            .filter(|n| n.language == Language::Python && n.module.is_some())
    }
}

/// Builds the source graph for `root`.
///
/// `on_discovered` is called once with the total file count before parsing
/// starts; `on_parsed` is called after each file is parsed, in arbitrary
/// order (parsing is dispatched to the rayon global pool). This matches the
/// `(total_files_discovered, on_parse_complete)` progress contract of
/// `spec.md` §4.1.
pub fn build_source_graph(
    root: &Path,
    exclude_folders: &[String],
    include_folders: &[String],
    skip_tests: bool,
    mut on_discovered: impl FnMut(usize),
    on_parsed: impl Fn() + Sync,
) -> SourceGraph {
    let (mut files, _dirs) =
        collect_source_files_gitignore(root, exclude_folders, include_folders, &["py"], false);

    if skip_tests {
        files.retain(|f| !is_test_path(&f.to_string_lossy()));
    }

    on_discovered(files.len());

    let nodes: Vec<SourceNode> = files
        .par_iter()
        .map(|file| {
            let node = parse_file(file);
            on_parsed();
            node
        })
        .collect();

    let parse_errors = nodes
        .iter()
        .filter_map(|n| {
            n.parse_error.as_ref().map(|message| ParseError {
                file: n.file_path.clone(),
                message: message.clone(),
            })
        })
        .collect();

    SourceGraph {
        root: root.to_path_buf(),
        nodes,
        parse_errors,
    }
}

fn parse_file(path: &Path) -> SourceNode {
    let language = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(Language::from_extension)
        .unwrap_or(Language::Python);

    let raw_text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            return SourceNode {
                file_path: path.to_path_buf(),
                language,
                raw_text: String::new(),
                line_index: LineIndex::new(""),
                module: None,
                parse_error: Some(format!("io error: {e}")),
            };
        }
    };

    let line_index = LineIndex::new(&raw_text);

    if language != Language::Python {
        // Java/Go are recognized but not yet parsed; see `source::Language`.
        return SourceNode {
            file_path: path.to_path_buf(),
            language,
            raw_text,
            line_index,
            module: None,
            parse_error: None,
        };
    }

    match ruff_python_parser::parse_module(&raw_text) {
        Ok(parsed) => SourceNode {
            file_path: path.to_path_buf(),
            language,
            raw_text,
            line_index,
            module: Some(parsed.into_syntax()),
            parse_error: None,
        },
        Err(e) => SourceNode {
            file_path: path.to_path_buf(),
            language,
            raw_text,
            line_index,
            module: None,
            parse_error: Some(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[test]
    fn parses_valid_file_and_skips_invalid() -> anyhow::Result<()> {
        let temp = tempdir()?;
        std::fs::write(temp.path().join("good.py"), "def f():\n    return 1\n")?;
        std::fs::write(temp.path().join("bad.py"), "def f(:\n")?;

        let discovered = AtomicUsize::new(0);
        let parsed = AtomicUsize::new(0);
        let graph = build_source_graph(
            temp.path(),
            &[],
            &[],
            false,
            |n| discovered.store(n, Ordering::SeqCst),
            || {
                parsed.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert_eq!(discovered.load(Ordering::SeqCst), 2);
        assert_eq!(parsed.load(Ordering::SeqCst), 2);
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.parse_errors.len(), 1);
        assert_eq!(graph.python_modules().count(), 1);
        Ok(())
    }

    #[test]
    fn skip_tests_excludes_test_files() -> anyhow::Result<()> {
        let temp = tempdir()?;
        std::fs::write(temp.path().join("app.py"), "x = 1\n")?;
        std::fs::write(temp.path().join("test_app.py"), "x = 1\n")?;

        let graph = build_source_graph(temp.path(), &[], &[], true, |_| {}, || {});
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].file_path.file_name().unwrap(), "app.py");
        Ok(())
    }
}

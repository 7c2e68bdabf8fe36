//! Module registry (C2).
//!
//! Maps every source file to its logical module path and indexes modules by
//! trailing (short) name for later call-graph resolution. Grounded in the
//! teacher's `graph/symbols.rs` FQN conventions (`SymbolInfo::fqn`,
//! module-path-joined-by-dots) generalized to a registry independent of any
//! one symbol.

use crate::error::PathfinderError;
use crate::source::SourceGraph;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

/// `module_path → file_path` and `short_name → [module_path]` indexes.
///
/// Invariant (`spec.md` §3, tested in `tests/module_registry_test.rs`):
/// `module_path → file_path` is injective — two distinct files never map to
/// the same module path.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    by_path: FxHashMap<String, PathBuf>,
    by_short_name: FxHashMap<String, Vec<String>>,
}

impl ModuleRegistry {
    /// Builds a registry from every Python file in `graph`, relative to
    /// `graph.root`.
    ///
    /// # Errors
    ///
    /// Returns [`PathfinderError::EmptyProject`] if no source file in
    /// `graph` was recognized.
    pub fn build(graph: &SourceGraph) -> Result<Self, PathfinderError> {
        let mut registry = Self::default();

        for node in &graph.nodes {
            let module_path = module_path_for(&graph.root, &node.file_path);
            registry.insert(module_path, node.file_path.clone());
        }

        if registry.by_path.is_empty() {
            return Err(PathfinderError::EmptyProject(graph.root.clone()));
        }

        Ok(registry)
    }

    fn insert(&mut self, module_path: String, file_path: PathBuf) {
        let short_name = module_path
            .rsplit('.')
            .next()
            .unwrap_or(&module_path)
            .to_owned();
        self.by_short_name
            .entry(short_name)
            .or_default()
            .push(module_path.clone());
        self.by_path.insert(module_path, file_path);
    }

    /// Looks up the file for an exact module path.
    #[must_use]
    pub fn file_for(&self, module_path: &str) -> Option<&Path> {
        self.by_path.get(module_path).map(PathBuf::as_path)
    }

    /// Looks up every module path carrying `short_name` as its trailing
    /// component. Non-unique: ambiguity is the call graph's concern
    /// (`spec.md` §4.3, §9).
    #[must_use]
    pub fn modules_with_short_name(&self, short_name: &str) -> &[String] {
        self.by_short_name
            .get(short_name)
            .map_or(&[], Vec::as_slice)
    }

    /// Iterates over every `(module_path, file_path)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.by_path
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_path()))
    }

    /// Total number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    /// Whether the registry has no modules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

/// Computes the dotted module path for `file`, relative to `root`: strips
/// the root and extension, joins directory segments with `.`, and collapses
/// a trailing `__init__` to the containing package (`spec.md` §4.2).
#[must_use]
pub fn module_path_for(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    let mut segments: Vec<String> = rel
        .components()
        .filter_map(|c| c.as_os_str().to_str().map(str::to_owned))
        .collect();

    if let Some(last) = segments.last_mut() {
        if let Some(stripped) = last.strip_suffix(".py") {
            *last = stripped.to_owned();
        }
    }

    if segments.last().is_some_and(|s| s == "__init__") {
        segments.pop();
    }

    if segments.is_empty() {
        "<module>".to_owned()
    } else {
        segments.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::build_source_graph;
    use tempfile::tempdir;

    #[test]
    fn module_path_strips_root_and_extension() {
        let root = Path::new("/proj");
        assert_eq!(
            module_path_for(root, Path::new("/proj/pkg/mod.py")),
            "pkg.mod"
        );
    }

    #[test]
    fn module_path_collapses_init() {
        let root = Path::new("/proj");
        assert_eq!(
            module_path_for(root, Path::new("/proj/pkg/__init__.py")),
            "pkg"
        );
    }

    #[test]
    fn module_path_injective_across_siblings() -> anyhow::Result<()> {
        let temp = tempdir()?;
        std::fs::create_dir_all(temp.path().join("a"))?;
        std::fs::create_dir_all(temp.path().join("b"))?;
        std::fs::write(temp.path().join("a/util.py"), "x = 1\n")?;
        std::fs::write(temp.path().join("b/util.py"), "x = 1\n")?;

        let graph = build_source_graph(temp.path(), &[], &[], false, |_| {}, || {});
        let registry = ModuleRegistry::build(&graph)?;

        assert_eq!(registry.len(), 2);
        let names = registry.modules_with_short_name("util");
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"a.util".to_owned()));
        assert!(names.contains(&"b.util".to_owned()));
        Ok(())
    }

    #[test]
    fn empty_project_errors() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let graph = build_source_graph(temp.path(), &[], &[], false, |_| {}, || {});
        assert!(matches!(
            ModuleRegistry::build(&graph),
            Err(PathfinderError::EmptyProject(_))
        ));
        Ok(())
    }
}

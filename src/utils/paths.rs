//! Path-related helpers: cross-platform normalization, path-traversal
//! containment checks, and gitignore-aware source discovery.

use crate::constants::DEFAULT_EXCLUDE_FOLDERS;

/// Normalizes a path for display in findings and PR comments.
///
/// - Converts backslashes to forward slashes.
/// - Strips a leading `./` or `.\` prefix.
///
/// # Examples
/// ```
/// use std::path::Path;
/// use code_pathfinder::utils::normalize_display_path;
///
/// assert_eq!(normalize_display_path(Path::new(".\\src\\app.py")), "src/app.py");
/// assert_eq!(normalize_display_path(Path::new("./src/app.py")), "src/app.py");
/// ```
#[must_use]
pub fn normalize_display_path(path: &std::path::Path) -> String {
    let s = path.to_string_lossy();
    let clean = s.trim_start_matches(r"\\?\");
    let normalized = clean.replace('\\', "/");
    normalized
        .strip_prefix("./")
        .unwrap_or(&normalized)
        .to_owned()
}

/// Checks whether `name` matches any exclusion pattern. Supports exact
/// matches and `*.ext`-style suffix wildcards.
#[must_use]
pub fn is_excluded(name: &str, excludes: &[String]) -> bool {
    for exclude in excludes {
        if let Some(suffix) = exclude.strip_prefix('*') {
            if name.ends_with(suffix) {
                return true;
            }
        } else if name == exclude {
            return true;
        }
    }
    false
}

/// Validates that `path` resolves to somewhere inside `root`, defending
/// against path-traversal (used as the zip-slip guard for ruleset bundle
/// extraction, `spec.md` §4.8/§8 property 7).
///
/// # Errors
///
/// Returns an error if either path fails to canonicalize, or if the
/// resolved path lies outside `root`.
pub fn validate_path_within_root(
    path: &std::path::Path,
    root: &std::path::Path,
) -> anyhow::Result<std::path::PathBuf> {
    let canonical_root = root
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("failed to resolve root {}: {}", root.display(), e))?;

    // The entry itself may not exist yet (we are validating before writing
    // it), so canonicalize the longest existing ancestor and check the
    // remaining components contain no `..`.
    let mut ancestor = path;
    let mut trailing = Vec::new();
    loop {
        if ancestor.exists() {
            break;
        }
        let Some(name) = ancestor.file_name() else {
            break;
        };
        trailing.push(name.to_owned());
        match ancestor.parent() {
            Some(p) => ancestor = p,
            None => break,
        }
    }

    let canonical_ancestor = if ancestor.as_os_str().is_empty() {
        canonical_root.clone()
    } else {
        ancestor
            .canonicalize()
            .map_err(|e| anyhow::anyhow!("failed to resolve {}: {}", ancestor.display(), e))?
    };

    if !canonical_ancestor.starts_with(&canonical_root) {
        anyhow::bail!(
            "path traversal detected: {} is outside of {}",
            path.display(),
            root.display()
        );
    }

    let mut resolved = canonical_ancestor;
    for component in trailing.into_iter().rev() {
        resolved.push(component);
    }
    Ok(resolved)
}

/// Validates that an output path (`--output-file`) doesn't escape the
/// current working directory (or an explicit `root`) via traversal.
///
/// # Errors
///
/// Returns an error if the root cannot be resolved or the path traverses
/// outside it.
pub fn validate_output_path(
    path: &std::path::Path,
    root: Option<&std::path::Path>,
) -> anyhow::Result<std::path::PathBuf> {
    let current_dir = std::env::current_dir()?;
    let root_dir = root.unwrap_or(&current_dir);
    let canonical_root = root_dir
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("failed to resolve root {}: {}", root_dir.display(), e))?;

    let absolute_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        canonical_root.join(path)
    };

    let mut ancestor = absolute_path.as_path();
    while !ancestor.exists() {
        match ancestor.parent() {
            Some(p) => ancestor = p,
            None => break,
        }
    }

    let canonical_ancestor = ancestor
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("failed to resolve {}: {}", ancestor.display(), e))?;

    if !canonical_ancestor.starts_with(&canonical_root) {
        anyhow::bail!(
            "output path '{}' is outside of '{}'",
            absolute_path.display(),
            canonical_root.display()
        );
    }

    if let Ok(remainder) = absolute_path.strip_prefix(ancestor) {
        for component in remainder.components() {
            if let std::path::Component::ParentDir = component {
                anyhow::bail!(
                    "path contains '..' in its non-existent portion: {}",
                    path.display()
                );
            }
        }
    }

    Ok(absolute_path)
}

/// Walks `root` collecting source files with the given extensions, honoring
/// `.gitignore`/`.git/info/exclude`/global gitignore in addition to the
/// hardcoded default exclusions.
///
/// Returns `(files, directories_visited)`.
#[must_use]
pub fn collect_source_files_gitignore(
    root: &std::path::Path,
    exclude: &[String],
    include: &[String],
    extensions: &[&str],
    verbose: bool,
) -> (Vec<std::path::PathBuf>, usize) {
    use ignore::WalkBuilder;

    let default_excludes: Vec<String> = DEFAULT_EXCLUDE_FOLDERS()
        .iter()
        .map(|&s| s.to_owned())
        .collect();
    let mut all_excludes: Vec<String> = exclude.iter().cloned().chain(default_excludes).collect();
    all_excludes.retain(|ex| !include.iter().any(|inc| ex == inc));

    let excludes_for_filter = all_excludes.clone();
    let root_for_filter = root.to_path_buf();

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .filter_entry(move |entry| {
            if entry.path() == root_for_filter {
                return true;
            }
            if !entry.file_type().is_some_and(|ft| ft.is_dir()) {
                return true;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_excluded(name, &excludes_for_filter) {
                    return false;
                }
            }
            true
        })
        .build();

    let mut files = Vec::new();
    let mut dir_count = 0;

    for result in walker {
        match result {
            Ok(entry) => {
                let path = entry.path();
                if entry.file_type().is_some_and(|ft| ft.is_dir()) {
                    if path != root {
                        dir_count += 1;
                    }
                    continue;
                }
                let matches_ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| extensions.contains(&e));
                if matches_ext {
                    files.push(path.to_path_buf());
                }
            }
            Err(e) if verbose => eprintln!("walk error: {e}"),
            Err(_) => {}
        }
    }

    (files, dir_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn validate_path_within_root_rejects_traversal() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path();
        fs::create_dir_all(root.join("subdir"))?;
        fs::write(root.join("subdir/file.py"), "# test")?;

        assert!(validate_path_within_root(&root.join("subdir/file.py"), root).is_ok());
        assert!(validate_path_within_root(&root.join("../outside.py"), root).is_err());
        assert!(
            validate_path_within_root(&root.join("subdir/../../etc/passwd"), root).is_err()
        );
        Ok(())
    }

    #[test]
    fn validate_path_within_root_allows_nonexistent_entries_inside_root() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path();
        let nested = root.join("bundle/a/rule.py");
        assert!(validate_path_within_root(&nested, root).is_ok());
        Ok(())
    }

    fn run_in_dir<F: FnOnce() -> anyhow::Result<()>>(dir: &Path, f: F) -> anyhow::Result<()> {
        let original = std::env::current_dir()?;
        std::env::set_current_dir(dir)?;
        let result = f();
        std::env::set_current_dir(original)?;
        result
    }

    #[test]
    fn validate_output_path_rejects_traversal() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path();
        fs::create_dir_all(root.join("subdir"))?;

        run_in_dir(root, || {
            assert!(validate_output_path(Path::new("./report.json"), None).is_ok());
            assert!(validate_output_path(Path::new("subdir/out.json"), None).is_ok());
            assert!(validate_output_path(Path::new("../outside.json"), None).is_err());
            assert!(validate_output_path(Path::new("subdir/../../escape.json"), None).is_err());
            Ok(())
        })
    }

    #[test]
    fn collect_source_files_respects_default_exclusions() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path();
        fs::write(root.join("main.py"), "# main")?;
        fs::create_dir_all(root.join(".venv"))?;
        fs::write(root.join(".venv/lib.py"), "# venv")?;
        fs::create_dir_all(root.join("src"))?;
        fs::write(root.join("src/module.py"), "# module")?;

        let (files, _) = collect_source_files_gitignore(root, &[], &[], &["py"], false);
        assert_eq!(files.len(), 2);
        Ok(())
    }
}

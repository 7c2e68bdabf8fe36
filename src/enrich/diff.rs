//! Changed-file set (`spec.md` §3 "Changed-file set").

use rustc_hash::FxHashSet;

/// An unordered set of repository-relative paths a scan should restrict its
/// findings to. Produced by `vcs::git`/`vcs::github` and consumed by
/// [`super::apply_diff_filter`].
pub type ChangedFiles = FxHashSet<String>;

/// Normalizes a changed-file list (as returned by `git diff --name-only` or
/// the GitHub PR files API) into a [`ChangedFiles`] set, forward-slash
/// normalizing every entry so it compares equal to an enriched detection's
/// `rel_path`.
#[must_use]
pub fn changed_files_from_git(paths: impl IntoIterator<Item = String>) -> ChangedFiles {
    paths.into_iter().map(|p| p.replace('\\', "/")).collect()
}

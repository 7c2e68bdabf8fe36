//! VCS change provider + PR commenter (C9, `spec.md` §4.9).
//!
//! Two [`ChangeProvider`] implementations compute the changed-file set a
//! diff-aware scan restricts itself to: [`git`] shells out to the real `git`
//! binary (`merge-base` + `diff --name-only`), [`github`] paginates the
//! GitHub PR files API. [`pr`] posts and updates the PR summary comment and
//! inline review comments, both idempotent via marker-based upsert.

/// Baseline-ref auto-detection and environment variables (`spec.md` §6).
pub mod baseline;
/// GitHub REST client: PR file pages, issue comments, review comments.
pub mod github;
/// Git subprocess-based change provider.
pub mod git;
/// Summary comment + inline review comment managers.
pub mod pr;

use crate::enrich::ChangedFiles;
use crate::error::PathfinderError;

/// Computes the set of repository-relative changed files a diff-aware scan
/// restricts its findings to (`spec.md` §4.9).
pub trait ChangeProvider {
    /// Returns the changed-file set, or a [`PathfinderError::Vcs`]/
    /// [`PathfinderError::Network`] if it couldn't be computed.
    ///
    /// # Errors
    ///
    /// See above.
    fn changed_files(&self) -> Result<ChangedFiles, PathfinderError>;
}

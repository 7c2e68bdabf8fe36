//! Baseline-ref auto-detection (`spec.md` §4.9, §6).
//!
//! Consulted in order: GitHub Actions, GitLab CI, then an explicit
//! override. The first one present wins; CI-provided branch names are
//! turned into a remote-tracking ref (`origin/<value>`) since the shallow
//! clone a CI runner checks out rarely has the base branch locally under
//! its own name. The explicit override is used verbatim, on the assumption
//! the caller already named a resolvable ref.

/// Resolves the diff-aware baseline ref from environment variables, in the
/// order `spec.md` §4.9 specifies.
#[must_use]
pub fn resolve_baseline_ref() -> Option<String> {
    resolve_baseline_ref_from(|name| std::env::var(name).ok())
}

/// Testable version of [`resolve_baseline_ref`] taking an injected env
/// lookup.
#[must_use]
pub fn resolve_baseline_ref_from(env: impl Fn(&str) -> Option<String>) -> Option<String> {
    if let Some(branch) = env("GITHUB_BASE_REF") {
        if !branch.is_empty() {
            return Some(format!("origin/{branch}"));
        }
    }
    if let Some(branch) = env("CI_MERGE_REQUEST_TARGET_BRANCH_NAME") {
        if !branch.is_empty() {
            return Some(format!("origin/{branch}"));
        }
    }
    if let Some(explicit) = env("PATHFINDER_BASELINE_REF") {
        if !explicit.is_empty() {
            return Some(explicit);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &HashMap<&str, &str>) -> impl Fn(&str) -> Option<String> + '_ {
        move |name| vars.get(name).map(|s| (*s).to_owned())
    }

    #[test]
    fn prefers_github_actions_over_gitlab() {
        let vars = HashMap::from([
            ("GITHUB_BASE_REF", "main"),
            ("CI_MERGE_REQUEST_TARGET_BRANCH_NAME", "develop"),
        ]);
        assert_eq!(
            resolve_baseline_ref_from(lookup(&vars)),
            Some("origin/main".to_owned())
        );
    }

    #[test]
    fn falls_back_to_gitlab_ci() {
        let vars = HashMap::from([("CI_MERGE_REQUEST_TARGET_BRANCH_NAME", "develop")]);
        assert_eq!(
            resolve_baseline_ref_from(lookup(&vars)),
            Some("origin/develop".to_owned())
        );
    }

    #[test]
    fn falls_back_to_explicit_override_raw() {
        let vars = HashMap::from([("PATHFINDER_BASELINE_REF", "deadbeef")]);
        assert_eq!(
            resolve_baseline_ref_from(lookup(&vars)),
            Some("deadbeef".to_owned())
        );
    }

    #[test]
    fn none_when_nothing_set() {
        let vars = HashMap::new();
        assert_eq!(resolve_baseline_ref_from(lookup(&vars)), None);
    }
}

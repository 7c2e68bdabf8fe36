//! Remote ruleset resolver orchestration (`spec.md` §4.8): parses specs,
//! resolves `category/all` against the manifest, downloads bundles through
//! [`super::download`], resolves individual rule IDs by walking a local
//! rules tree, and materializes every source into one combined directory
//! the loader (C5) can point `--rules` at.

use super::cache::default_cache_dir;
use super::download::{self, DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_TTL};
use super::manifest::{fetch_manifest, Manifest};
use super::spec::RulesetSpec;
use crate::error::PathfinderError;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default base URL ruleset manifests are fetched from, overridable via
/// `--ruleset-base-url` or the `PATHFINDER_RULESET_BASE_URL` environment
/// variable.
pub const DEFAULT_RULESET_BASE_URL: &str = "https://rulesets.codepathfinder.dev";

/// Resolves `--ruleset`/`--rules` sources into a single combined directory
/// for the rule loader.
pub struct RulesetResolver {
    client: reqwest::blocking::Client,
    cache_dir: PathBuf,
    base_url: String,
    refresh: bool,
}

impl RulesetResolver {
    /// Builds a resolver writing cache entries under [`default_cache_dir`].
    #[must_use]
    pub fn new(base_url: impl Into<String>, refresh: bool) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            cache_dir: default_cache_dir(),
            base_url: base_url.into(),
            refresh,
        }
    }

    /// Overrides the cache directory (tests, `--cache-dir`-style overrides).
    #[must_use]
    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = dir;
        self
    }

    fn manifest_url(&self, category: &str) -> String {
        format!("{}/{category}/manifest.json", self.base_url.trim_end_matches('/'))
    }

    /// Fetches the manifest for `category`.
    ///
    /// # Errors
    ///
    /// Returns [`PathfinderError::Network`] on transport failure, timeout,
    /// or a non-2xx response (HTTP 404 is fatal for the requested ruleset
    /// per `spec.md` §8 boundary behaviors).
    pub fn manifest(&self, category: &str) -> Result<Manifest, PathfinderError> {
        fetch_manifest(&self.client, &self.manifest_url(category))
    }

    /// Expands a single [`RulesetSpec`] into a list of extracted bundle
    /// directories: one for `Bundle`, every bundle in the category for
    /// `Category` (`category/all`). `RuleId` specs are handled separately
    /// by [`Self::resolve_rule_id`] since they resolve to one file, not a
    /// directory.
    ///
    /// # Errors
    ///
    /// Propagates manifest-fetch and bundle-download errors. Returns
    /// [`PathfinderError::Validation`] if `spec` is a `RuleId` spec (use
    /// [`Self::resolve_rule_id`] for those).
    pub fn resolve(&self, spec: &RulesetSpec) -> Result<Vec<PathBuf>, PathfinderError> {
        match spec {
            RulesetSpec::Bundle { category, bundle } => {
                let manifest = self.manifest(category)?;
                let info = manifest.bundle(bundle).ok_or_else(|| {
                    PathfinderError::Network(format!("bundle '{bundle}' not found in category '{category}' manifest"))
                })?;
                let dir = download::download(
                    &self.client,
                    &self.cache_dir,
                    info,
                    category,
                    DEFAULT_DOWNLOAD_TIMEOUT,
                    DEFAULT_TTL,
                    self.refresh,
                )?;
                Ok(vec![dir])
            }
            RulesetSpec::Category { category } => {
                let manifest = self.manifest(category)?;
                let mut dirs = Vec::new();
                for name in manifest.bundle_names() {
                    let info = manifest.bundle(&name).expect("name came from bundle_names()");
                    let dir = download::download(
                        &self.client,
                        &self.cache_dir,
                        info,
                        category,
                        DEFAULT_DOWNLOAD_TIMEOUT,
                        DEFAULT_TTL,
                        self.refresh,
                    )?;
                    dirs.push(dir);
                }
                Ok(dirs)
            }
            RulesetSpec::RuleId { .. } => Err(PathfinderError::Validation(
                "RuleId specs resolve to a single file; use resolve_rule_id_via_cache".to_owned(),
            )),
        }
    }

    /// Resolves a `language/RULE-ID` spec: ensures every bundle in
    /// `language`'s category is downloaded into the cache, then walks the
    /// cache directory for the rule file (`spec.md` §4.8 `resolve_rule_id`).
    ///
    /// # Errors
    ///
    /// Propagates manifest/download errors, or
    /// [`PathfinderError::Validation`] if no cached file declares the id.
    pub fn resolve_rule_id_via_cache(&self, language: &str, rule_id: &str) -> Result<PathBuf, PathfinderError> {
        self.resolve(&RulesetSpec::Category { category: language.to_owned() })?;
        Self::resolve_rule_id(&self.cache_dir, language, rule_id)
    }

    /// Walks `local_rules_root/language/` for the first `.py` file
    /// containing an exact decorator argument `id="RULE-ID"` or
    /// `id='RULE-ID'`, skipping files whose name starts with `__`
    /// (`spec.md` §4.8 `resolve_rule_id`).
    ///
    /// # Errors
    ///
    /// Returns [`PathfinderError::Validation`] if no matching file is found.
    pub fn resolve_rule_id(
        local_rules_root: &Path,
        language: &str,
        rule_id: &str,
    ) -> Result<PathBuf, PathfinderError> {
        let dir = local_rules_root.join(language);
        let needle_double = format!("id=\"{rule_id}\"");
        let needle_single = format!("id='{rule_id}'");

        let mut candidates: Vec<PathBuf> = walkdir::WalkDir::new(&dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("py"))
            .filter(|e| !e.file_name().to_string_lossy().starts_with("__"))
            .map(|e| e.path().to_path_buf())
            .collect();
        candidates.sort();

        for path in candidates {
            if let Ok(content) = std::fs::read_to_string(&path) {
                if content.contains(&needle_double) || content.contains(&needle_single) {
                    return Ok(path);
                }
            }
        }

        Err(PathfinderError::Validation(format!(
            "no rule file under '{}' declares id \"{rule_id}\"",
            dir.display()
        )))
    }

    /// Materializes every resolved source (downloaded bundle directories
    /// plus individually resolved rule files) into one temporary directory
    /// with disjoint per-source subdirectories, ready for the loader to
    /// point `--rules` at (`spec.md` §4.8 "materializes them into a single
    /// temporary directory").
    ///
    /// # Errors
    ///
    /// Returns [`PathfinderError::Io`] if the temp directory or its entries
    /// can't be created.
    pub fn materialize(bundle_dirs: &[PathBuf], rule_files: &[PathBuf]) -> Result<PathBuf, PathfinderError> {
        let temp_root = std::env::temp_dir().join(format!("pathfinder-rules-{}", std::process::id()));
        std::fs::create_dir_all(&temp_root).map_err(|e| PathfinderError::Io { path: temp_root.clone(), source: e })?;

        for (i, dir) in bundle_dirs.iter().enumerate() {
            let dest = temp_root.join(format!("bundle-{i}"));
            copy_dir_recursive(dir, &dest)?;
        }

        if !rule_files.is_empty() {
            let dest_dir = temp_root.join("by-id");
            std::fs::create_dir_all(&dest_dir).map_err(|e| PathfinderError::Io { path: dest_dir.clone(), source: e })?;
            for file in rule_files {
                if let Some(name) = file.file_name() {
                    let dest = dest_dir.join(name);
                    std::fs::copy(file, &dest).map_err(|e| PathfinderError::Io { path: dest, source: e })?;
                }
            }
        }

        Ok(temp_root)
    }
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<(), PathfinderError> {
    std::fs::create_dir_all(dest).map_err(|e| PathfinderError::Io { path: dest.to_path_buf(), source: e })?;
    for entry in walkdir::WalkDir::new(src).into_iter().filter_map(Result::ok) {
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| PathfinderError::Io { path: target, source: e })?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| PathfinderError::Io { path: parent.to_path_buf(), source: e })?;
            }
            std::fs::copy(entry.path(), &target).map_err(|e| PathfinderError::Io { path: target, source: e })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolve_rule_id_finds_matching_decorator_double_quotes() {
        let temp = tempdir().unwrap();
        let lang_dir = temp.path().join("python");
        std::fs::create_dir_all(&lang_dir).unwrap();
        std::fs::write(lang_dir.join("__init__.py"), "id=\"CWE-89\"").unwrap();
        std::fs::write(lang_dir.join("sqli.py"), "@rule(id=\"CWE-89\")\ndef check(): ...\n").unwrap();

        let found = RulesetResolver::resolve_rule_id(temp.path(), "python", "CWE-89").unwrap();
        assert_eq!(found.file_name().unwrap(), "sqli.py");
    }

    #[test]
    fn resolve_rule_id_finds_single_quoted_id() {
        let temp = tempdir().unwrap();
        let lang_dir = temp.path().join("python");
        std::fs::create_dir_all(&lang_dir).unwrap();
        std::fs::write(lang_dir.join("xss.py"), "@rule(id='CWE-79')\n").unwrap();

        let found = RulesetResolver::resolve_rule_id(temp.path(), "python", "CWE-79").unwrap();
        assert_eq!(found.file_name().unwrap(), "xss.py");
    }

    #[test]
    fn resolve_rule_id_errors_when_absent() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("python")).unwrap();
        assert!(RulesetResolver::resolve_rule_id(temp.path(), "python", "CWE-999").is_err());
    }

    #[test]
    fn materialize_combines_bundle_dirs_into_disjoint_subdirs() {
        let temp = tempdir().unwrap();
        let bundle_a = temp.path().join("a");
        let bundle_b = temp.path().join("b");
        std::fs::create_dir_all(&bundle_a).unwrap();
        std::fs::create_dir_all(&bundle_b).unwrap();
        std::fs::write(bundle_a.join("rule1.py"), "id=\"X-1\"").unwrap();
        std::fs::write(bundle_b.join("rule2.py"), "id=\"X-2\"").unwrap();

        let combined = RulesetResolver::materialize(&[bundle_a, bundle_b], &[]).unwrap();
        assert!(combined.join("bundle-0/rule1.py").exists());
        assert!(combined.join("bundle-1/rule2.py").exists());
        std::fs::remove_dir_all(&combined).ok();
    }
}

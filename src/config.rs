//! Project configuration loader.
//!
//! Narrows the teacher's TOML-with-`pyproject.toml`-fallback pattern
//! (`Config::load_from_path`) to this spec's CLI surface (`spec.md` §6):
//! rule sources, output defaults, fail-on severities, diff-aware defaults,
//! skip-tests default, and GitHub PR settings. Confidence, quality, and
//! secrets thresholds from the teacher's schema are dropped — they aren't
//! part of this pipeline's data model.

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Top-level configuration file (`.pathfinder.toml`).
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// The `[pathfinder]` section.
    #[serde(default)]
    pub pathfinder: PathfinderConfig,
}

/// Configuration options under `[pathfinder]` (or `[tool.pathfinder]` in
/// `pyproject.toml`).
#[derive(Debug, Deserialize, Default, Clone)]
pub struct PathfinderConfig {
    /// Local rules directory or file, equivalent to `--rules`.
    pub rules: Option<String>,
    /// Remote ruleset specs, equivalent to repeated `--ruleset`.
    #[serde(default)]
    pub rulesets: Vec<String>,
    /// Default output format: `text`, `json`, `sarif`, or `csv`.
    pub output: Option<String>,
    /// Severities that cause a non-zero exit, comma-joined at the CLI
    /// boundary (e.g. `["critical", "high"]`).
    #[serde(default)]
    pub fail_on: Vec<String>,
    /// Skip recognized test files by default.
    pub skip_tests: Option<bool>,
    /// Enable diff-aware scanning by default.
    pub diff_aware: Option<bool>,
    /// Extra folders to exclude, on top of the built-in defaults.
    #[serde(default)]
    pub exclude_folders: Vec<String>,
    /// Folders to force-include, overriding default/explicit exclusions.
    #[serde(default)]
    pub include_folders: Vec<String>,
    /// `owner/repo` for GitHub PR operations.
    pub github_repo: Option<String>,
    /// Post a PR summary comment by default.
    pub pr_comment: Option<bool>,
    /// Post inline PR review comments by default.
    pub pr_inline: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
struct PyProject {
    tool: ToolConfig,
}

#[derive(Debug, Deserialize, Clone)]
struct ToolConfig {
    pathfinder: PathfinderConfig,
}

impl Config {
    /// Loads configuration from the current directory, walking upward.
    #[must_use]
    pub fn load() -> Self {
        Self::load_from_path(Path::new("."))
    }

    /// Loads configuration starting from `path`, walking upward until a
    /// `.pathfinder.toml` or `pyproject.toml` with a `[tool.pathfinder]`
    /// section is found, or the filesystem root is reached.
    #[must_use]
    pub fn load_from_path(path: &Path) -> Self {
        let mut current = path.to_path_buf();
        if current.is_file() {
            current.pop();
        }

        loop {
            let pathfinder_toml = current.join(".pathfinder.toml");
            if pathfinder_toml.exists() {
                if let Ok(content) = fs::read_to_string(&pathfinder_toml) {
                    if let Ok(config) = toml::from_str::<Config>(&content) {
                        return config;
                    }
                }
            }

            let pyproject_toml = current.join("pyproject.toml");
            if pyproject_toml.exists() {
                if let Ok(content) = fs::read_to_string(&pyproject_toml) {
                    if let Ok(pyproject) = toml::from_str::<PyProject>(&content) {
                        return Config {
                            pathfinder: pyproject.tool.pathfinder,
                        };
                    }
                }
            }

            if !current.pop() {
                break;
            }
        }

        Config::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_pathfinder_toml() -> anyhow::Result<()> {
        let temp = tempdir()?;
        std::fs::write(
            temp.path().join(".pathfinder.toml"),
            "[pathfinder]\nrules = \"./rules\"\nfail_on = [\"critical\", \"high\"]\n",
        )?;
        let config = Config::load_from_path(temp.path());
        assert_eq!(config.pathfinder.rules.as_deref(), Some("./rules"));
        assert_eq!(config.pathfinder.fail_on, vec!["critical", "high"]);
        Ok(())
    }

    #[test]
    fn falls_back_to_pyproject_toml() -> anyhow::Result<()> {
        let temp = tempdir()?;
        std::fs::write(
            temp.path().join("pyproject.toml"),
            "[tool.pathfinder]\noutput = \"sarif\"\n",
        )?;
        let config = Config::load_from_path(temp.path());
        assert_eq!(config.pathfinder.output.as_deref(), Some("sarif"));
        Ok(())
    }

    #[test]
    fn defaults_when_nothing_found() {
        let temp = tempdir().unwrap();
        let config = Config::load_from_path(temp.path());
        assert!(config.pathfinder.rules.is_none());
    }
}

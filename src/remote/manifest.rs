//! Ruleset category manifest (`spec.md` §6 "Ruleset manifest (JSON)").

use crate::error::PathfinderError;
use serde::Deserialize;
use std::time::Duration;

/// Per-request timeout for manifest fetches (`spec.md` §5).
const MANIFEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One downloadable bundle within a category manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct BundleInfo {
    /// Bundle name.
    pub name: String,
    /// Prose description.
    #[serde(default)]
    pub description: String,
    /// Severities this bundle's rules may emit.
    #[serde(default)]
    pub severity_filter: Vec<String>,
    /// Whether this bundle is part of the recommended default set.
    #[serde(default)]
    pub recommended: bool,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Number of `.py` rule files in the bundle.
    pub file_count: u64,
    /// Zip size in bytes, used to verify the download before checksumming.
    pub zip_size: u64,
    /// Hex-encoded SHA-256 of the zip.
    pub checksum: String,
    /// Absolute or manifest-relative download URL.
    pub download_url: String,
}

/// A category's manifest (`spec.md` §6).
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Category name, e.g. `python`.
    pub category: String,
    /// Bundle name -> bundle info.
    pub bundles: std::collections::BTreeMap<String, BundleInfo>,
    /// Free-form category descriptions, not consumed by the resolver.
    #[serde(default)]
    pub categories_info: Vec<serde_json::Value>,
    /// Base URL bundle download URLs may be relative to.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Manifest {
    /// Looks up a bundle by name.
    #[must_use]
    pub fn bundle(&self, name: &str) -> Option<&BundleInfo> {
        self.bundles.get(name)
    }

    /// Every bundle name in the manifest, used to expand `category/all`.
    #[must_use]
    pub fn bundle_names(&self) -> Vec<String> {
        self.bundles.keys().cloned().collect()
    }
}

/// Fetches and parses a category manifest from `manifest_url`.
///
/// # Errors
///
/// Returns [`PathfinderError::Network`] on transport failure, timeout, a
/// non-2xx response (HTTP 404 is fatal for the requested ruleset per
/// `spec.md` §8 boundary behaviors), or malformed JSON.
pub fn fetch_manifest(client: &reqwest::blocking::Client, manifest_url: &str) -> Result<Manifest, PathfinderError> {
    let response = client
        .get(manifest_url)
        .timeout(MANIFEST_TIMEOUT)
        .send()
        .map_err(|e| PathfinderError::Network(format!("manifest fetch failed: {e}")))?;

    if !response.status().is_success() {
        return Err(PathfinderError::Network(format!(
            "manifest fetch returned {} for {manifest_url}",
            response.status()
        )));
    }

    response
        .json()
        .map_err(|e| PathfinderError::Network(format!("invalid manifest JSON from {manifest_url}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_manifest_json() {
        let raw = r#"{
            "category": "python",
            "bundles": {
                "sql-injection": {
                    "name": "sql-injection",
                    "description": "SQL injection rules",
                    "severity_filter": ["critical", "high"],
                    "recommended": true,
                    "tags": ["owasp"],
                    "file_count": 3,
                    "zip_size": 1024,
                    "checksum": "deadbeef",
                    "download_url": "https://example.com/bundles/sql-injection.zip"
                }
            },
            "categories_info": [],
            "base_url": "https://example.com"
        }"#;
        let manifest: Manifest = serde_json::from_str(raw).unwrap();
        assert_eq!(manifest.category, "python");
        assert_eq!(manifest.bundle_names(), vec!["sql-injection".to_owned()]);
        assert_eq!(manifest.bundle("sql-injection").unwrap().file_count, 3);
    }
}

//! TTL ruleset cache (`spec.md` §3 "Remote ruleset cache entry", §6 "Cache
//! layout", §8 property 6).
//!
//! Entry metadata lives at `<cache_dir>/<category>/<bundle>.json`; the
//! extracted rule files live alongside it at `<cache_dir>/<category>/<bundle>/`.
//! A hit requires all three: the checksum in the manifest still matches the
//! one recorded at download time, the entry hasn't passed `expires_at`, and
//! the extracted directory is still present on disk (`spec.md` §3 invariant).

use crate::error::PathfinderError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One cached bundle's metadata (`spec.md` §3 "Remote ruleset cache entry").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Category the bundle belongs to.
    pub category: String,
    /// Bundle name within the category.
    pub bundle: String,
    /// Directory the bundle's `.py` rule files were extracted into.
    pub extracted_dir: PathBuf,
    /// Hex-encoded SHA-256 of the zip this entry was extracted from.
    pub checksum: String,
    /// When this entry was written.
    pub cached_at: DateTime<Utc>,
    /// When this entry stops being considered a hit.
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether this entry is still a valid hit against `manifest_checksum`:
    /// not expired, checksum unchanged, and the extracted directory exists.
    #[must_use]
    pub fn is_hit(&self, manifest_checksum: &str, now: DateTime<Utc>) -> bool {
        self.checksum == manifest_checksum && now < self.expires_at && self.extracted_dir.is_dir()
    }
}

/// Resolves the cache root directory: `$XDG_CACHE_HOME/code-pathfinder/rules`
/// or `$HOME/.cache/code-pathfinder/rules` (`spec.md` §6 "Cache layout").
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    let base = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".cache")))
        .unwrap_or_else(|| PathBuf::from(".cache"));
    base.join("code-pathfinder").join("rules")
}

fn entry_path(cache_dir: &Path, category: &str, bundle: &str) -> PathBuf {
    cache_dir.join(category).join(format!("{bundle}.json"))
}

/// Extracted-files directory for a bundle, regardless of whether it's
/// currently cached.
#[must_use]
pub fn extracted_dir(cache_dir: &Path, category: &str, bundle: &str) -> PathBuf {
    cache_dir.join(category).join(bundle)
}

/// Reads the cache entry for `category/bundle`, if one was ever written.
///
/// # Errors
///
/// Returns [`PathfinderError::Io`] only on a read failure other than
/// "file doesn't exist"; a missing or malformed entry is treated as a miss
/// (`Ok(None)`), never an error.
pub fn read_entry(cache_dir: &Path, category: &str, bundle: &str) -> Result<Option<CacheEntry>, PathfinderError> {
    let path = entry_path(cache_dir, category, bundle);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path).map_err(|e| PathfinderError::Io { path: path.clone(), source: e })?;
    Ok(serde_json::from_str(&content).ok())
}

/// Writes (or overwrites) the cache entry for `category/bundle`. Two
/// concurrent scans of the same bundle may race here; the last writer wins
/// and both still produce correct output (`spec.md` §5 "Shared-resource
/// policy").
///
/// # Errors
///
/// Returns [`PathfinderError::Io`] if the entry directory can't be created
/// or the entry file can't be written.
pub fn write_entry(cache_dir: &Path, entry: &CacheEntry) -> Result<(), PathfinderError> {
    let path = entry_path(cache_dir, &entry.category, &entry.bundle);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PathfinderError::Io { path: parent.to_path_buf(), source: e })?;
    }
    let json = serde_json::to_string_pretty(entry).unwrap_or_default();
    std::fs::write(&path, json).map_err(|e| PathfinderError::Io { path, source: e })
}

/// Invalidates the cache entry and deletes the extracted directory for
/// `category/bundle`, ahead of a `--refresh-rules` re-download (`spec.md`
/// §4.8 "Refresh mode").
///
/// # Errors
///
/// Returns [`PathfinderError::Io`] if a filesystem removal fails for a
/// reason other than the path not existing.
pub fn invalidate(cache_dir: &Path, category: &str, bundle: &str) -> Result<(), PathfinderError> {
    let entry_file = entry_path(cache_dir, category, bundle);
    if entry_file.exists() {
        std::fs::remove_file(&entry_file).map_err(|e| PathfinderError::Io { path: entry_file, source: e })?;
    }
    let dir = extracted_dir(cache_dir, category, bundle);
    if dir.exists() {
        std::fs::remove_dir_all(&dir).map_err(|e| PathfinderError::Io { path: dir, source: e })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tempfile::tempdir;

    #[test]
    fn miss_when_never_written() {
        let temp = tempdir().unwrap();
        assert!(read_entry(temp.path(), "python", "sql-injection").unwrap().is_none());
    }

    #[test]
    fn round_trips_an_entry() {
        let temp = tempdir().unwrap();
        let dir = extracted_dir(temp.path(), "python", "sql-injection");
        std::fs::create_dir_all(&dir).unwrap();
        let now = Utc::now();
        let entry = CacheEntry {
            category: "python".to_owned(),
            bundle: "sql-injection".to_owned(),
            extracted_dir: dir,
            checksum: "deadbeef".to_owned(),
            cached_at: now,
            expires_at: now + ChronoDuration::hours(1),
        };
        write_entry(temp.path(), &entry).unwrap();

        let loaded = read_entry(temp.path(), "python", "sql-injection").unwrap().unwrap();
        assert!(loaded.is_hit("deadbeef", now));
        assert!(!loaded.is_hit("wrongchecksum", now));
    }

    #[test]
    fn expired_entry_is_not_a_hit() {
        let temp = tempdir().unwrap();
        let dir = extracted_dir(temp.path(), "python", "bundle");
        std::fs::create_dir_all(&dir).unwrap();
        let now = Utc::now();
        let entry = CacheEntry {
            category: "python".to_owned(),
            bundle: "bundle".to_owned(),
            extracted_dir: dir,
            checksum: "abc".to_owned(),
            cached_at: now - ChronoDuration::hours(2),
            expires_at: now - ChronoDuration::hours(1),
        };
        assert!(!entry.is_hit("abc", now));
    }

    #[test]
    fn missing_extracted_dir_is_not_a_hit() {
        let temp = tempdir().unwrap();
        let now = Utc::now();
        let entry = CacheEntry {
            category: "python".to_owned(),
            bundle: "gone".to_owned(),
            extracted_dir: temp.path().join("never-created"),
            checksum: "abc".to_owned(),
            cached_at: now,
            expires_at: now + ChronoDuration::hours(1),
        };
        assert!(!entry.is_hit("abc", now));
    }

    #[test]
    fn invalidate_removes_entry_and_dir() {
        let temp = tempdir().unwrap();
        let dir = extracted_dir(temp.path(), "python", "bundle");
        std::fs::create_dir_all(&dir).unwrap();
        let now = Utc::now();
        let entry = CacheEntry {
            category: "python".to_owned(),
            bundle: "bundle".to_owned(),
            extracted_dir: dir.clone(),
            checksum: "abc".to_owned(),
            cached_at: now,
            expires_at: now + ChronoDuration::hours(1),
        };
        write_entry(temp.path(), &entry).unwrap();
        invalidate(temp.path(), "python", "bundle").unwrap();
        assert!(read_entry(temp.path(), "python", "bundle").unwrap().is_none());
        assert!(!dir.exists());
    }
}

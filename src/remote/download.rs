//! Bundle download, verification, and zip-slip-safe extraction (`spec.md`
//! §4.8 "download(bundle_spec)", §8 properties 6-7).

use super::cache::{self, CacheEntry};
use super::manifest::BundleInfo;
use crate::error::PathfinderError;
use crate::utils::validate_path_within_root;
use chrono::{Duration as ChronoDuration, Utc};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Number of download attempts before giving up (`spec.md` §4.8).
const MAX_ATTEMPTS: u32 = 3;
/// Linear backoff between attempts (`spec.md` §4.8: "1-second linear
/// backoff" — attempt N waits `N * BACKOFF_STEP`).
const BACKOFF_STEP: Duration = Duration::from_secs(1);

/// Default per-download timeout (`spec.md` §5: "downloads (configurable;
/// default 30 s)").
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cache TTL for a freshly downloaded bundle.
pub const DEFAULT_TTL: ChronoDuration = ChronoDuration::hours(24);

/// Resolves `category/bundle`, using the TTL cache when possible
/// (`spec.md` §4.8). `refresh` forces invalidation of any existing entry
/// before proceeding.
///
/// # Errors
///
/// Returns [`PathfinderError::Network`] on transport/timeout failure,
/// [`PathfinderError::Integrity`] on a byte-size or checksum mismatch, or
/// [`PathfinderError::Security`] if any zip entry would extract outside the
/// target directory (`spec.md` §8 property 7). All three are fatal only for
/// this bundle, not the whole scan (`spec.md` §7).
pub fn download(
    client: &reqwest::blocking::Client,
    cache_dir: &Path,
    bundle: &BundleInfo,
    category: &str,
    timeout: Duration,
    ttl: ChronoDuration,
    refresh: bool,
) -> Result<PathBuf, PathfinderError> {
    if refresh {
        cache::invalidate(cache_dir, category, &bundle.name)?;
    } else if let Some(entry) = cache::read_entry(cache_dir, category, &bundle.name)? {
        if entry.is_hit(&bundle.checksum, Utc::now()) {
            return Ok(entry.extracted_dir);
        }
    }

    let bytes = fetch_with_retry(client, &bundle.download_url, timeout)?;
    verify_integrity(&bytes, bundle, category)?;

    let target_dir = cache::extracted_dir(cache_dir, category, &bundle.name);
    extract_zip_safely(&bytes, &target_dir)?;

    let now = Utc::now();
    let entry = CacheEntry {
        category: category.to_owned(),
        bundle: bundle.name.clone(),
        extracted_dir: target_dir.clone(),
        checksum: bundle.checksum.clone(),
        cached_at: now,
        expires_at: now + ttl,
    };
    cache::write_entry(cache_dir, &entry)?;

    Ok(target_dir)
}

/// Verifies a downloaded bundle's byte size and SHA-256 checksum against
/// what the manifest declared (`spec.md` §8 property 6, scenario S6).
/// Pulled out of [`download`] so the tamper-detection property is directly
/// unit-testable without a network round trip.
fn verify_integrity(bytes: &[u8], bundle: &BundleInfo, category: &str) -> Result<(), PathfinderError> {
    if bytes.len() as u64 != bundle.zip_size {
        return Err(PathfinderError::Integrity(format!(
            "bundle '{}/{}' size mismatch: manifest declares {} bytes, downloaded {}",
            category,
            bundle.name,
            bundle.zip_size,
            bytes.len()
        )));
    }

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hex_encode(&hasher.finalize());
    if !digest.eq_ignore_ascii_case(&bundle.checksum) {
        return Err(PathfinderError::Integrity(format!(
            "bundle '{}/{}' checksum mismatch: manifest declares {}, computed {digest}",
            category, bundle.name, bundle.checksum
        )));
    }

    Ok(())
}

fn fetch_with_retry(client: &reqwest::blocking::Client, url: &str, timeout: Duration) -> Result<Vec<u8>, PathfinderError> {
    let mut last_error = String::new();
    for attempt in 1..=MAX_ATTEMPTS {
        match fetch_once(client, url, timeout) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => {
                last_error = e;
                if attempt < MAX_ATTEMPTS {
                    std::thread::sleep(BACKOFF_STEP * attempt);
                }
            }
        }
    }
    Err(PathfinderError::Network(format!(
        "download of {url} failed after {MAX_ATTEMPTS} attempts: {last_error}"
    )))
}

fn fetch_once(client: &reqwest::blocking::Client, url: &str, timeout: Duration) -> Result<Vec<u8>, String> {
    let response = client.get(url).timeout(timeout).send().map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }
    response.bytes().map(|b| b.to_vec()).map_err(|e| e.to_string())
}

/// Extracts `zip_bytes` into `target_dir`, rejecting any entry whose
/// resolved path would escape `target_dir` (zip-slip, `spec.md` §4.8/§8
/// property 7). Reuses [`validate_path_within_root`], the same containment
/// check the source walker never needed but the teacher's path-validation
/// helper already implements exactly.
fn extract_zip_safely(zip_bytes: &[u8], target_dir: &Path) -> Result<(), PathfinderError> {
    std::fs::create_dir_all(target_dir).map_err(|e| PathfinderError::Io { path: target_dir.to_path_buf(), source: e })?;

    let cursor = std::io::Cursor::new(zip_bytes);
    let mut archive = zip::ZipArchive::new(cursor)
        .map_err(|e| PathfinderError::Security(format!("not a valid zip archive: {e}")))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| PathfinderError::Security(format!("corrupt zip entry {i}: {e}")))?;

        let Some(enclosed) = file.enclosed_name() else {
            return Err(PathfinderError::Security(format!(
                "zip entry '{}' resolves outside the extraction root",
                file.name()
            )));
        };

        let dest = target_dir.join(enclosed);

        if file.is_dir() {
            std::fs::create_dir_all(&dest).map_err(|e| PathfinderError::Io { path: dest.clone(), source: e })?;
            continue;
        }

        let validated = validate_path_within_root(&dest, target_dir)
            .map_err(|e| PathfinderError::Security(format!("zip-slip rejected for '{}': {e}", file.name())))?;

        if let Some(parent) = validated.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PathfinderError::Io { path: parent.to_path_buf(), source: e })?;
        }

        let mut out = std::fs::File::create(&validated).map_err(|e| PathfinderError::Io { path: validated.clone(), source: e })?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(|e| PathfinderError::Io { path: validated.clone(), source: e })?;
        std::io::Write::write_all(&mut out, &buf).map_err(|e| PathfinderError::Io { path: validated, source: e })?;
    }

    Ok(())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::tempdir;

    fn zip_with_entries(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let cursor = std::io::Cursor::new(&mut buf);
            let mut writer = zip::ZipWriter::new(cursor);
            let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
            for (name, data) in entries {
                writer.start_file(*name, options.clone()).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn tampered_bundle_fails_integrity_check_s6() {
        let bundle = BundleInfo {
            name: "sql-injection".to_owned(),
            description: String::new(),
            severity_filter: Vec::new(),
            recommended: false,
            tags: Vec::new(),
            file_count: 1,
            zip_size: 4,
            checksum: "X".repeat(64),
            download_url: "https://example.invalid/bundle.zip".to_owned(),
        };

        let tampered_bytes = b"evil";
        let result = verify_integrity(tampered_bytes, &bundle, "python");
        assert!(matches!(result, Err(PathfinderError::Integrity(_))));
    }

    #[test]
    fn extracts_nested_py_files() {
        let temp = tempdir().unwrap();
        let target = temp.path().join("out");
        let zip_bytes = zip_with_entries(&[
            ("a.py", b"id=\"X-1\""),
            ("nested/b.py", b"id=\"X-2\""),
        ]);
        extract_zip_safely(&zip_bytes, &target).unwrap();
        assert!(target.join("a.py").exists());
        assert!(target.join("nested/b.py").exists());
    }

    #[test]
    fn zip_slip_entry_is_rejected_s7() {
        // `enclosed_name()` already refuses to resolve `..`-containing
        // entries (returns `None`), which is exactly the "no file written
        // outside the target root" guarantee spec.md §8 property 7 demands.
        let temp = tempdir().unwrap();
        let target = temp.path().join("out");
        let zip_bytes = zip_with_entries(&[("../../evil.py", b"id=\"EVIL\"")]);
        let result = extract_zip_safely(&zip_bytes, &target);
        assert!(result.is_err());
        assert!(!temp.path().join("evil.py").exists());
    }

    #[test]
    fn hex_encode_matches_known_sha256() {
        let mut hasher = Sha256::new();
        hasher.update(b"");
        let digest = hex_encode(&hasher.finalize());
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

//! On-disk metadata cache. One file per key, two namespaces: `records/`
//! holds raw lookup responses keyed by identifier, `citations/` holds raw
//! citation text keyed by secondary catalog id.
//!
//! Absence is not an error (it is a tier miss), a malformed file is a miss,
//! and a failed write logs a warning rather than propagating — a broken
//! cache shouldn't abort the run.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use shelfmark_common::ShelfmarkError;

pub struct MetadataCache {
    records_dir: PathBuf,
    citations_dir: PathBuf,
}

impl MetadataCache {
    /// Open (creating if needed) a cache rooted at `root`.
    pub fn open(root: &Path) -> Result<Self, ShelfmarkError> {
        let records_dir = root.join("records");
        let citations_dir = root.join("citations");
        for dir in [&records_dir, &citations_dir] {
            fs::create_dir_all(dir).map_err(|e| {
                ShelfmarkError::Cache(format!("creating {}: {e}", dir.display()))
            })?;
        }
        Ok(Self {
            records_dir,
            citations_dir,
        })
    }

    /// Cached lookup response for an identifier, if present and parseable.
    pub fn read_record(&self, identifier: &str) -> Option<serde_json::Value> {
        let path = self.record_path(identifier);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(identifier, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(
                    identifier,
                    path = %path.display(),
                    error = %e,
                    "Malformed cache file, treating as miss"
                );
                None
            }
        }
    }

    /// Persist a raw lookup response. Failure is logged, never propagated.
    pub fn write_record(&self, identifier: &str, record: &serde_json::Value) {
        let path = self.record_path(identifier);
        let raw = match serde_json::to_string_pretty(record) {
            Ok(s) => s,
            Err(e) => {
                warn!(identifier, error = %e, "Failed to serialize record for cache");
                return;
            }
        };
        if let Err(e) = fs::write(&path, raw) {
            warn!(
                identifier,
                path = %path.display(),
                error = %e,
                "Failed to write cache record"
            );
        }
    }

    /// Cached citation text for a secondary catalog identifier.
    pub fn read_citation(&self, catalog_id: &str) -> Option<String> {
        let path = self.citation_path(catalog_id);
        match fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(_) => None,
        }
    }

    /// Persist raw citation text. Failure is logged, never propagated.
    pub fn write_citation(&self, catalog_id: &str, text: &str) {
        let path = self.citation_path(catalog_id);
        if let Err(e) = fs::write(&path, text) {
            warn!(
                catalog_id,
                path = %path.display(),
                error = %e,
                "Failed to write cached citation"
            );
        }
    }

    fn record_path(&self, identifier: &str) -> PathBuf {
        self.records_dir.join(format!("{}.json", safe_key(identifier)))
    }

    fn citation_path(&self, catalog_id: &str) -> PathBuf {
        self.citations_dir.join(format!("{}.txt", safe_key(catalog_id)))
    }
}

/// Reduce an arbitrary key to a filesystem-safe name. Alphanumerics and
/// hyphens pass through; everything else becomes `_`.
fn safe_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_a_record() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MetadataCache::open(dir.path()).unwrap();

        assert!(cache.read_record("9784000000000").is_none());
        cache.write_record("9784000000000", &json!({"title": "振動学"}));
        let back = cache.read_record("9784000000000").unwrap();
        assert_eq!(back["title"], "振動学");
    }

    #[test]
    fn malformed_record_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MetadataCache::open(dir.path()).unwrap();

        std::fs::write(dir.path().join("records/bad.json"), "{not json").unwrap();
        assert!(cache.read_record("bad").is_none());
    }

    #[test]
    fn citations_are_stored_separately_from_records() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MetadataCache::open(dir.path()).unwrap();

        cache.write_citation("BN01234567", "title: 振動学\nauthor: 谷口修");
        assert!(cache.read_citation("BN01234567").is_some());
        assert!(cache.read_record("BN01234567").is_none());
    }

    #[test]
    fn keys_are_sanitized_for_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MetadataCache::open(dir.path()).unwrap();

        cache.write_record("978-4/00..0000000", &json!({}));
        assert!(cache.read_record("978-4/00..0000000").is_some());
        // No stray path components escaped the records dir.
        assert!(dir.path().join("records").join("978-4_00__0000000.json").exists());
    }
}

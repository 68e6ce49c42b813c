//! TTL-bounded result cache persisted as a single JSON file.
//!
//! The whole snapshot is read once at construction and rewritten on every
//! mutation. A missing or corrupt file is treated as an empty cache; the
//! next successful write repairs it. Malformed entries are skipped one by
//! one.

use crate::error::DomainVerifyError;
use crate::types::{CacheEntry, CacheStats, Method};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Persisted mapping from domain to its last definite outcome.
pub struct ResultCache {
    path: Option<PathBuf>,
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl ResultCache {
    /// Open the cache backed by `path`, loading whatever it currently holds.
    pub fn open<P: Into<PathBuf>>(path: P, ttl: Duration) -> Self {
        let path = path.into();
        let entries = load_entries(&path);
        debug!(path = %path.display(), entries = entries.len(), "result cache loaded");

        Self {
            path: Some(path),
            ttl,
            entries,
        }
    }

    /// A cache that lives only as long as this value.
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            path: None,
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        match (now - entry.checked_at).to_std() {
            Ok(age) => age > self.ttl,
            // Timestamps from the future count as fresh
            Err(_) => false,
        }
    }

    /// Look up a domain, purging its entry if it has outlived the TTL.
    pub fn get(&mut self, domain: &str) -> Option<CacheEntry> {
        let expired = match self.entries.get(domain) {
            None => return None,
            Some(entry) => self.is_expired(entry, Utc::now()),
        };

        if expired {
            self.entries.remove(domain);
            debug!(domain, "purged stale cache entry");
            if let Err(e) = self.save() {
                warn!(error = %e, "failed to persist cache after purge");
            }
            return None;
        }

        self.entries.get(domain).cloned()
    }

    /// Record a definite outcome for a domain.
    pub fn set(&mut self, domain: &str, available: bool, method: Method) -> Result<(), DomainVerifyError> {
        self.insert(domain, available, method, Utc::now());
        self.save()
    }

    /// Record many outcomes with a single rewrite.
    pub fn set_batch(
        &mut self,
        results: &HashMap<String, bool>,
        method: Method,
    ) -> Result<(), DomainVerifyError> {
        let now = Utc::now();
        for (domain, available) in results {
            self.insert(domain, *available, method, now);
        }
        self.save()
    }

    fn insert(&mut self, domain: &str, available: bool, method: Method, checked_at: DateTime<Utc>) {
        self.entries.insert(
            domain.to_string(),
            CacheEntry {
                domain: domain.to_string(),
                available,
                method,
                checked_at,
            },
        );
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn clear_expired(&mut self) -> Result<usize, DomainVerifyError> {
        let now = Utc::now();
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| match (now - entry.checked_at).to_std() {
            Ok(age) => age <= ttl,
            Err(_) => true,
        });

        let removed = before - self.entries.len();
        if removed > 0 {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStats {
        let available = self.entries.values().filter(|e| e.available).count();
        CacheStats {
            total_entries: self.entries.len(),
            available_domains: available,
            unavailable_domains: self.entries.len() - available,
        }
    }

    fn save(&self) -> Result<(), DomainVerifyError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                DomainVerifyError::file_error(parent.to_string_lossy(), e.to_string())
            })?;
        }

        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, json)
            .map_err(|e| DomainVerifyError::file_error(path.to_string_lossy(), e.to_string()))
    }
}

fn load_entries(path: &Path) -> HashMap<String, CacheEntry> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable cache file, starting empty");
            return HashMap::new();
        }
    };

    let raw = match serde_json::from_str::<HashMap<String, serde_json::Value>>(&content) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt cache file, starting empty");
            return HashMap::new();
        }
    };

    // One malformed entry must not take the rest of the file with it
    let mut entries = HashMap::with_capacity(raw.len());
    for (domain, value) in raw {
        match serde_json::from_value::<CacheEntry>(value) {
            Ok(mut entry) => {
                entry.domain = domain.clone();
                entries.insert(domain, entry);
            }
            Err(e) => warn!(domain = %domain, error = %e, "skipping malformed cache entry"),
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn test_set_then_get_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results").join("cache.json");

        let mut cache = ResultCache::open(&path, DAY);
        cache.set("taken.com", false, Method::Dns).unwrap();
        cache.set("free.com", true, Method::Whois).unwrap();

        let mut reopened = ResultCache::open(&path, DAY);
        let entry = reopened.get("free.com").unwrap();
        assert_eq!(entry.domain, "free.com");
        assert!(entry.available);
        assert_eq!(entry.method, Method::Whois);
        assert!(!reopened.get("taken.com").unwrap().available);
    }

    #[test]
    fn test_file_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = ResultCache::open(&path, DAY);
        cache.set("free.com", true, Method::Dns).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let entry = &raw["free.com"];
        assert_eq!(entry["available"], true);
        assert_eq!(entry["method"], "dns");
        assert!(entry["checked_at"].as_str().unwrap().contains('T'));
        assert!(entry.get("domain").is_none());
    }

    #[test]
    fn test_stale_entry_is_purged_on_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let stale = Utc::now() - ChronoDuration::hours(25);
        let fresh = Utc::now() - ChronoDuration::hours(1);
        fs::write(
            &path,
            format!(
                r#"{{"old.com": {{"available": false, "method": "dns", "checked_at": "{}"}},
                    "new.com": {{"available": true, "method": "whois", "checked_at": "{}"}}}}"#,
                stale.to_rfc3339(),
                fresh.to_rfc3339()
            ),
        )
        .unwrap();

        let mut cache = ResultCache::open(&path, DAY);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("old.com").is_none());
        assert_eq!(cache.len(), 1);
        assert!(cache.get("new.com").is_some());

        // Purge was written back
        let reopened = ResultCache::open(&path, DAY);
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_corrupt_or_missing_file_means_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let cache = ResultCache::open(&path, DAY);
        assert!(cache.is_empty());

        fs::write(&path, "{ not json").unwrap();
        let mut cache = ResultCache::open(&path, DAY);
        assert!(cache.is_empty());

        // Next write repairs the file
        cache.set("a.com", true, Method::Dns).unwrap();
        assert_eq!(ResultCache::open(&path, DAY).len(), 1);
    }

    #[test]
    fn test_offsetless_timestamps_are_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let now = chrono::Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f");
        fs::write(
            &path,
            format!(
                r#"{{"a.com": {{"available": true, "method": "whois", "checked_at": "{now}"}},
                    "b.com": {{"available": false, "method": "dns", "checked_at": "{now}"}}}}"#
            ),
        )
        .unwrap();

        let mut cache = ResultCache::open(&path, DAY);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a.com").unwrap().available);

        // Existing entries survive the next write
        cache.set("c.com", true, Method::Dns).unwrap();
        assert_eq!(ResultCache::open(&path, DAY).len(), 3);
    }

    #[test]
    fn test_malformed_entry_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(
            &path,
            format!(
                r#"{{"good.com": {{"available": true, "method": "dns", "checked_at": "{}"}},
                    "bad.com": {{"available": null, "method": "dns", "checked_at": "{}"}}}}"#,
                Utc::now().to_rfc3339(),
                Utc::now().to_rfc3339()
            ),
        )
        .unwrap();

        let mut cache = ResultCache::open(&path, DAY);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("good.com").is_some());
        assert!(cache.get("bad.com").is_none());
    }

    #[test]
    fn test_clear_expired_and_stats() {
        let mut cache = ResultCache::in_memory(Duration::from_secs(3600));
        cache.set("a.com", true, Method::Dns).unwrap();
        cache.set("b.com", false, Method::Dns).unwrap();
        cache.insert("c.com", true, Method::Whois, Utc::now() - ChronoDuration::hours(2));

        assert_eq!(
            cache.stats(),
            CacheStats {
                total_entries: 3,
                available_domains: 2,
                unavailable_domains: 1,
            }
        );
        assert_eq!(cache.clear_expired().unwrap(), 1);
        assert_eq!(cache.stats().total_entries, 2);
    }

    #[test]
    fn test_set_batch() {
        let mut cache = ResultCache::in_memory(DAY);
        let mut results = HashMap::new();
        results.insert("a.com".to_string(), true);
        results.insert("b.com".to_string(), false);

        cache.set_batch(&results, Method::Dns).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b.com").unwrap().method, Method::Dns);
    }
}

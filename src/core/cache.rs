// CrashSleuth - core/cache.rs
//
// Thread-safe analysis-result cache keyed by (log_path, analyzer_name),
// invalidated when the source file's mtime changes. A single mutex guards
// the table; no analyzer may hold it during its own I/O.

use crate::core::model::AnalysisResult;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStatistics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CacheKey {
    log_path: PathBuf,
    analyzer_name: String,
}

struct CacheEntry {
    result: AnalysisResult,
    mtime: SystemTime,
}

struct Inner {
    table: HashMap<CacheKey, CacheEntry>,
    stats: CacheStatistics,
}

/// Memoizes analyzer output by `(log fingerprint, analyzer name)`, per §4.6.
pub struct AnalysisResultCache {
    inner: Mutex<Inner>,
}

impl Default for AnalysisResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisResultCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                table: HashMap::new(),
                stats: CacheStatistics::default(),
            }),
        }
    }

    /// Returns the cached result iff its stored mtime equals `current_mtime`.
    pub fn get(
        &self,
        log_path: &Path,
        analyzer_name: &str,
        current_mtime: SystemTime,
    ) -> Option<AnalysisResult> {
        let key = CacheKey {
            log_path: log_path.to_path_buf(),
            analyzer_name: analyzer_name.to_string(),
        };
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let hit = inner
            .table
            .get(&key)
            .filter(|entry| entry.mtime == current_mtime)
            .map(|entry| entry.result.clone());
        if hit.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        hit
    }

    /// Stores `result` iff `result.success` is true.
    pub fn put(&self, log_path: &Path, analyzer_name: &str, mtime: SystemTime, result: AnalysisResult) {
        if !result.success {
            return;
        }
        let key = CacheKey {
            log_path: log_path.to_path_buf(),
            analyzer_name: analyzer_name.to_string(),
        };
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.table.insert(key, CacheEntry { result, mtime });
    }

    /// Returns whether any entry for `log_path` still matches `current_mtime`.
    pub fn is_file_cache_valid(&self, log_path: &Path, current_mtime: SystemTime) -> bool {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        inner
            .table
            .keys()
            .filter(|k| k.log_path == log_path)
            .any(|k| inner.table[k].mtime == current_mtime)
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.inner.lock().expect("cache mutex poisoned").stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_cached_entry_with_unchanged_mtime() {
        let cache = AnalysisResultCache::new();
        let path = PathBuf::from("a.log");
        let mtime = SystemTime::now();
        cache.put(&path, "Suspect", mtime, AnalysisResult::empty("Suspect"));

        assert!(cache.get(&path, "Suspect", mtime).is_some());
        let stats = cache.statistics();
        assert!(stats.hits >= 1);
        assert!(stats.hit_rate() > 0.0);
    }

    #[test]
    fn invalidates_on_mtime_change() {
        let cache = AnalysisResultCache::new();
        let path = PathBuf::from("a.log");
        let first_mtime = SystemTime::now();
        cache.put(&path, "Suspect", first_mtime, AnalysisResult::empty("Suspect"));

        let later_mtime = first_mtime + std::time::Duration::from_secs(1);
        assert!(cache.get(&path, "Suspect", later_mtime).is_none());
    }

    #[test]
    fn failed_result_is_not_cached() {
        let cache = AnalysisResultCache::new();
        let path = PathBuf::from("a.log");
        let mtime = SystemTime::now();
        cache.put(&path, "Suspect", mtime, AnalysisResult::failed("Suspect", "boom"));
        assert!(cache.get(&path, "Suspect", mtime).is_none());
    }
}

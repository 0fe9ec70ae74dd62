use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CachedEntry<T> {
    pub fingerprint: String,
    pub cached_at: DateTime<Utc>,
    pub value: Arc<T>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

/// Holds one computed value per source-content fingerprint. A value is
/// replaced only when the fingerprint changes or `invalidate` is called.
#[derive(Debug)]
pub struct FingerprintCache<T> {
    entry: Option<CachedEntry<T>>,
    stats: CacheStats,
}

impl<T> Default for FingerprintCache<T> {
    fn default() -> Self {
        Self {
            entry: None,
            stats: CacheStats::default(),
        }
    }
}

impl<T> FingerprintCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, fingerprint: &str) -> Option<Arc<T>> {
        match &self.entry {
            Some(entry) if entry.fingerprint == fingerprint => {
                self.stats.hits += 1;
                Some(entry.value.clone())
            }
            _ => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn get_or_try_insert_with<F>(&mut self, fingerprint: &str, build: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.get(fingerprint) {
            debug!("cache hit for fingerprint {}", short(fingerprint));
            return Ok(value);
        }
        debug!("cache miss for fingerprint {}", short(fingerprint));
        let value = Arc::new(build()?);
        self.entry = Some(CachedEntry {
            fingerprint: fingerprint.to_string(),
            cached_at: Utc::now(),
            value: value.clone(),
        });
        Ok(value)
    }

    /// Most recent value regardless of fingerprint.
    pub fn latest(&self) -> Option<&CachedEntry<T>> {
        self.entry.as_ref()
    }

    pub fn invalidate(&mut self) {
        if self.entry.take().is_some() {
            self.stats.invalidations += 1;
        }
    }

    /// Restarts the age clock after the source was re-checked and unchanged.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if let Some(entry) = &mut self.entry {
            entry.cached_at = now;
        }
    }

    pub fn is_stale(&self, max_age_secs: Option<u64>, now: DateTime<Utc>) -> bool {
        let Some(entry) = &self.entry else {
            return true;
        };
        let Some(secs) = max_age_secs else {
            return false;
        };
        // Ages beyond chrono's range never expire.
        match i64::try_from(secs).ok().and_then(Duration::try_seconds) {
            Some(max_age) => now - entry.cached_at >= max_age,
            None => false,
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use anyhow::anyhow;
    use chrono::{Duration, Utc};

    use super::FingerprintCache;

    #[test]
    fn reuses_value_for_same_fingerprint() {
        let builds = Cell::new(0);
        let mut cache = FingerprintCache::new();
        let build = || {
            builds.set(builds.get() + 1);
            Ok(builds.get())
        };
        let first = cache.get_or_try_insert_with("abc", build).expect("first");
        let second = cache
            .get_or_try_insert_with("abc", || Ok(99))
            .expect("second");
        assert_eq!(*first, 1);
        assert_eq!(*second, 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn new_fingerprint_replaces_value() {
        let mut cache = FingerprintCache::new();
        cache.get_or_try_insert_with("one", || Ok(1)).expect("one");
        let value = cache.get_or_try_insert_with("two", || Ok(2)).expect("two");
        assert_eq!(*value, 2);
        assert_eq!(cache.latest().map(|e| e.fingerprint.as_str()), Some("two"));
    }

    #[test]
    fn invalidate_forces_rebuild() {
        let mut cache = FingerprintCache::new();
        cache.get_or_try_insert_with("same", || Ok(1)).expect("one");
        cache.invalidate();
        assert!(cache.latest().is_none());
        let value = cache.get_or_try_insert_with("same", || Ok(2)).expect("two");
        assert_eq!(*value, 2);
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn failed_build_leaves_cache_untouched() {
        let mut cache: FingerprintCache<i32> = FingerprintCache::new();
        cache.get_or_try_insert_with("ok", || Ok(5)).expect("ok");
        let err = cache.get_or_try_insert_with("bad", || Err(anyhow!("broken sheet")));
        assert!(err.is_err());
        assert_eq!(cache.latest().map(|e| *e.value), Some(5));
    }

    #[test]
    fn staleness_follows_max_age() {
        let mut cache = FingerprintCache::new();
        assert!(cache.is_stale(None, Utc::now()));
        cache.get_or_try_insert_with("x", || Ok(())).expect("insert");
        assert!(!cache.is_stale(None, Utc::now() + Duration::days(30)));
        assert!(!cache.is_stale(Some(60), Utc::now()));
        assert!(cache.is_stale(Some(60), Utc::now() + Duration::seconds(61)));
    }

    #[test]
    fn huge_max_age_never_expires() {
        let mut cache = FingerprintCache::new();
        cache.get_or_try_insert_with("x", || Ok(())).expect("insert");
        let later = Utc::now() + Duration::days(365 * 100);
        assert!(!cache.is_stale(Some(u64::MAX), later));
        assert!(!cache.is_stale(Some(i64::MAX as u64), later));
    }

    #[test]
    fn touch_restarts_age_clock() {
        let mut cache = FingerprintCache::new();
        cache.get_or_try_insert_with("x", || Ok(1)).expect("insert");
        let later = Utc::now() + Duration::seconds(120);
        assert!(cache.is_stale(Some(60), later));
        cache.touch(later);
        assert!(!cache.is_stale(Some(60), later));
    }
}

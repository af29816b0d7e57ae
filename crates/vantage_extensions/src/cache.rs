//! # Read Cache
//!
//! Memoized JSON produced by the read path, keyed by data kind and the uuid of
//! the server or player it describes.
//!
//! The gather pipeline never reads from here, it only invalidates. Entries also
//! expire once they have not been read for the idle window.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;
use uuid::Uuid;

/// Default idle window of an entry.
pub const DEFAULT_IDLE_EXPIRY: Duration = Duration::from_secs(120);

/// Kind of JSON document cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataId {
    /// Extension navigation of a server page
    ExtensionNav,
    /// Extension tabs of a server page
    ExtensionTabs,
    /// Extension columns of a server's players table, for at most `limit` players
    ExtensionPlayersTable { limit: usize },
    /// Extension data of one player
    ExtensionPlayer,
}

#[derive(Debug, Clone)]
struct CachedJson {
    json: Arc<String>,
    last_access: Instant,
}

impl CachedJson {
    fn is_fresh(&self, idle_expiry: Duration) -> bool {
        self.last_access.elapsed() < idle_expiry
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
pub struct JsonCache {
    entries: DashMap<(DataId, Uuid), CachedJson>,
    idle_expiry: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for JsonCache {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_EXPIRY)
    }
}

impl JsonCache {
    pub fn new(idle_expiry: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            idle_expiry,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the cached document or computes, stores and returns a new one.
    ///
    /// A failing `compute` leaves the cache untouched.
    pub fn get_or_compute<E>(
        &self,
        id: DataId,
        key: Uuid,
        compute: impl FnOnce() -> Result<String, E>,
    ) -> Result<Arc<String>, E> {
        if let Some(mut entry) = self.entries.get_mut(&(id, key)) {
            if entry.is_fresh(self.idle_expiry) {
                entry.last_access = Instant::now();
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(&entry.json));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let json = Arc::new(compute()?);
        self.entries.insert(
            (id, key),
            CachedJson {
                json: Arc::clone(&json),
                last_access: Instant::now(),
            },
        );
        Ok(json)
    }

    pub fn invalidate(&self, id: DataId, key: Uuid) {
        if self.entries.remove(&(id, key)).is_some() {
            trace!(?id, %key, "Invalidated cached json");
        }
    }

    /// Removes every entry the predicate matches.
    pub fn invalidate_matching(&self, predicate: impl Fn(DataId, &Uuid) -> bool) {
        self.entries.retain(|(id, key), _| !predicate(*id, key));
    }

    /// Drops idle entries and returns how many were removed.
    pub fn clean_up(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(self.idle_expiry));
        before.saturating_sub(self.entries.len())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn compute(value: &str) -> impl FnOnce() -> Result<String, Infallible> + '_ {
        move || Ok(value.to_string())
    }

    #[test]
    fn test_second_read_is_a_hit() {
        let cache = JsonCache::default();
        let key = Uuid::new_v4();
        let first = cache.get_or_compute(DataId::ExtensionNav, key, compute("a")).unwrap();
        let second = cache.get_or_compute(DataId::ExtensionNav, key, compute("b")).unwrap();

        assert_eq!(*first, "a");
        assert_eq!(*second, "a");
        assert_eq!(cache.stats(), CacheStats { entries: 1, hits: 1, misses: 1 });
    }

    #[test]
    fn test_invalidate_forces_recompute() {
        let cache = JsonCache::default();
        let key = Uuid::new_v4();
        cache.get_or_compute(DataId::ExtensionTabs, key, compute("old")).unwrap();
        cache.invalidate(DataId::ExtensionTabs, key);

        let json = cache.get_or_compute(DataId::ExtensionTabs, key, compute("new")).unwrap();
        assert_eq!(*json, "new");
    }

    #[test]
    fn test_invalidate_matching_kind() {
        let cache = JsonCache::default();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        cache.get_or_compute(DataId::ExtensionPlayer, a, compute("a")).unwrap();
        cache.get_or_compute(DataId::ExtensionPlayer, b, compute("b")).unwrap();
        cache.get_or_compute(DataId::ExtensionNav, a, compute("nav")).unwrap();

        cache.invalidate_matching(|id, _| id == DataId::ExtensionPlayer);
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_failed_compute_is_not_cached() {
        let cache = JsonCache::default();
        let key = Uuid::new_v4();
        let result: Result<Arc<String>, &str> = cache.get_or_compute(DataId::ExtensionNav, key, || Err("down"));

        assert_eq!(result, Err("down"));
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_idle_entries_expire() {
        let cache = JsonCache::new(Duration::ZERO);
        let key = Uuid::new_v4();
        cache.get_or_compute(DataId::ExtensionNav, key, compute("a")).unwrap();

        assert_eq!(cache.clean_up(), 1);
        let json = cache.get_or_compute(DataId::ExtensionNav, key, compute("b")).unwrap();
        assert_eq!(*json, "b");
    }
}

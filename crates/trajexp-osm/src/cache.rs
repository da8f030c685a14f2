//! Footprint cache keyed by grid cell
//!
//! Entries are immutable once written, so a poisoned lock is still readable.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use trajexp_core::models::{BuildingFootprint, GridKey};

/// Cache key: the snapped grid cells plus the endpoint and tag filter used
/// to query them
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub cells: GridKey,
    pub endpoint: String,
    pub filter: String,
}

impl CacheKey {
    pub fn new(cells: GridKey, endpoint: impl Into<String>, filter: impl Into<String>) -> Self {
        Self { cells, endpoint: endpoint.into(), filter: filter.into() }
    }
}

#[derive(Debug)]
struct CacheEntry {
    footprints: Arc<Vec<BuildingFootprint>>,
    inserted_at: Instant,
}

/// Footprint sets previously fetched, shared by every worker of a run
#[derive(Debug, Default)]
pub struct FetchCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl FetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Footprints stored under `key` less than `ttl` ago
    pub fn get(&self, key: &CacheKey, ttl: Duration) -> Option<Arc<Vec<BuildingFootprint>>> {
        let entries = self.read();
        entries
            .get(key)
            .filter(|entry| entry.inserted_at.elapsed() < ttl)
            .map(|entry| Arc::clone(&entry.footprints))
    }

    /// Store footprints under `key`, replacing any previous entry and
    /// evicting every entry older than `ttl`
    pub fn insert(
        &self,
        key: CacheKey,
        footprints: Vec<BuildingFootprint>,
        ttl: Duration,
    ) -> Arc<Vec<BuildingFootprint>> {
        let footprints = Arc::new(footprints);
        let entry = CacheEntry { footprints: Arc::clone(&footprints), inserted_at: Instant::now() };

        let mut entries = self.write();
        let evicted = retain_fresh(&mut entries, ttl);
        if evicted > 0 {
            tracing::debug!(evicted, "Expired footprint sets evicted");
        }
        entries.insert(key, entry);
        footprints
    }

    /// Drop entries older than `ttl`, returning how many were removed
    pub fn purge_expired(&self, ttl: Duration) -> usize {
        retain_fresh(&mut self.write(), ttl)
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

fn retain_fresh(entries: &mut HashMap<CacheKey, CacheEntry>, ttl: Duration) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
    before - entries.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    const ENDPOINT: &str = "https://overpass.example/api/interpreter";
    const HOUR: Duration = Duration::from_secs(3600);

    fn key(x: i64) -> CacheKey {
        CacheKey::new(GridKey { min_x: x, min_y: 0, max_x: x + 1, max_y: 1 }, ENDPOINT, r#"["building"]"#)
    }

    fn footprint(id: &str) -> BuildingFootprint {
        BuildingFootprint::new(
            id,
            polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)],
        )
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = FetchCache::new();
        cache.insert(key(0), vec![footprint("way/1")], HOUR);

        let hit = cache.get(&key(0), Duration::from_secs(60)).unwrap();
        assert_eq!(hit.len(), 1);
        assert!(cache.get(&key(1), Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = FetchCache::new();
        cache.insert(key(0), vec![footprint("way/1")], HOUR);
        assert!(cache.get(&key(0), Duration::ZERO).is_none());
        assert_eq!(cache.purge_expired(Duration::ZERO), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_filter_is_part_of_key() {
        let cache = FetchCache::new();
        cache.insert(key(0), vec![footprint("way/1")], HOUR);
        let other = CacheKey::new(key(0).cells, ENDPOINT, r#"["building"="house"]"#);
        assert!(cache.get(&other, Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_endpoint_is_part_of_key() {
        let cache = FetchCache::new();
        cache.insert(key(0), vec![footprint("way/1")], HOUR);
        let mirror = CacheKey::new(key(0).cells, "https://mirror.example/api/interpreter", r#"["building"]"#);
        assert!(cache.get(&mirror, HOUR).is_none());
        assert!(cache.get(&key(0), HOUR).is_some());
    }

    #[test]
    fn test_insert_evicts_expired_entries() {
        let cache = FetchCache::new();
        for x in 0..200 {
            cache.insert(key(x), vec![footprint("way/1")], Duration::ZERO);
        }
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key(199), HOUR).is_some());

        for x in 0..5 {
            cache.insert(key(x), vec![footprint("way/1")], HOUR);
        }
        assert_eq!(cache.len(), 6);
    }

    #[test]
    fn test_last_writer_wins_and_clear() {
        let cache = FetchCache::new();
        cache.insert(key(0), vec![footprint("way/1")], HOUR);
        cache.insert(key(0), vec![footprint("way/1"), footprint("way/2")], HOUR);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key(0), Duration::from_secs(60)).unwrap().len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}

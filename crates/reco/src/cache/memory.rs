//! In-process cache tier.
//!
//! Backed by a concurrent map so request tasks never coordinate
//! externally; recency and hit counts live inside each entry, and
//! eviction drops the least recently accessed entry once the tier is at
//! capacity. Expired entries are evicted lazily on lookup and are never
//! served.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::TierStats;
use crate::types::RecommendationMethod;

/// A cached payload with its expiry and bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub last_access: Instant,
    pub hits: u64,
    pub method: RecommendationMethod,
}

pub struct MemoryTier<T: Clone> {
    name: &'static str,
    capacity: usize,
    entries: DashMap<String, CacheEntry<T>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<T: Clone> MemoryTier<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up a key: a live hit bumps the entry's counter and recency, an
    /// expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let expired = match self.entries.get_mut(key) {
            Some(mut entry) => {
                if now < entry.expires_at {
                    entry.hits += 1;
                    entry.last_access = now;
                    let value = entry.value.clone();
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(value);
                }
                true
            }
            None => false,
        };

        if expired {
            self.entries.remove(key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, key: String, value: T, ttl: Duration, method: RecommendationMethod) {
        let now = Instant::now();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_least_recent();
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl,
                last_access: now,
                hits: 0,
                method,
            },
        );
    }

    fn evict_least_recent(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().last_access)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove every entry whose key matches the predicate; used for
    /// id-based invalidation.
    pub fn remove_where(&self, predicate: impl Fn(&str) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !predicate(key));
        before - self.entries.len()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> TierStats {
        TierStats::new(
            self.name,
            self.entries.len() as u64,
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.evictions.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(capacity: usize) -> MemoryTier<String> {
        MemoryTier::new("test", capacity)
    }

    #[test]
    fn round_trip_before_expiry() {
        let cache = tier(4);
        cache.insert(
            "a".to_string(),
            "payload".to_string(),
            Duration::from_secs(60),
            RecommendationMethod::Hybrid,
        );
        assert_eq!(cache.get("a"), Some("payload".to_string()));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn expired_entries_are_never_served() {
        let cache = tier(4);
        cache.insert(
            "a".to_string(),
            "payload".to_string(),
            Duration::from_millis(0),
            RecommendationMethod::Hybrid,
        );
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = tier(2);
        cache.insert(
            "old".to_string(),
            "1".to_string(),
            Duration::from_secs(60),
            RecommendationMethod::Hybrid,
        );
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(
            "fresh".to_string(),
            "2".to_string(),
            Duration::from_secs(60),
            RecommendationMethod::Hybrid,
        );
        std::thread::sleep(Duration::from_millis(2));
        // Touch "old" so "fresh" becomes the eviction victim.
        assert!(cache.get("old").is_some());
        std::thread::sleep(Duration::from_millis(2));

        cache.insert(
            "new".to_string(),
            "3".to_string(),
            Duration::from_secs(60),
            RecommendationMethod::Hybrid,
        );
        assert_eq!(cache.len(), 2);
        assert!(cache.get("old").is_some());
        assert!(cache.get("fresh").is_none());
        assert!(cache.get("new").is_some());
    }

    #[test]
    fn remove_where_matches_key_segments() {
        let cache = tier(8);
        for key in ["reco:HYBRID:room-1:anonymous:1", "reco:HYBRID:room-2:anonymous:1"] {
            cache.insert(
                key.to_string(),
                "x".to_string(),
                Duration::from_secs(60),
                RecommendationMethod::Hybrid,
            );
        }
        let removed = cache.remove_where(|k| k.contains(":room-1:"));
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
    }
}

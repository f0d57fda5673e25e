//! The hot → warm → distributed cache chain.
//!
//! Lookups walk the tiers in order and promote on hit; writes populate the
//! hot and distributed tiers unconditionally and the warm tier only for
//! results worth keeping around. A failing distributed tier degrades to a
//! miss, never to a failed request.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{CacheKey, CacheStatsReport, DistributedTier, MemoryTier};
use crate::config::CacheSettings;
use crate::types::{RecommendationMethod, RecommendationResponse};

pub struct RecommendationCache {
    hot: MemoryTier<RecommendationResponse>,
    warm: MemoryTier<RecommendationResponse>,
    distributed: Option<DistributedTier>,
    settings: CacheSettings,
}

impl RecommendationCache {
    pub fn new(settings: CacheSettings, distributed: Option<DistributedTier>) -> Self {
        Self {
            hot: MemoryTier::new("hot", settings.hot_capacity),
            warm: MemoryTier::new("warm", settings.warm_capacity),
            distributed,
            settings,
        }
    }

    pub fn key(
        &self,
        method: RecommendationMethod,
        room_id: Uuid,
        caller: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> CacheKey {
        CacheKey::new(method, room_id, caller, now, self.settings.time_bucket_sec)
    }

    /// Walk hot → warm → distributed. Warm hits are promoted into hot;
    /// distributed hits are promoted into hot only.
    pub async fn lookup(&self, key: &CacheKey) -> Option<RecommendationResponse> {
        let cache_key = key.key_string();

        if let Some(response) = self.hot.get(&cache_key) {
            debug!(key = %cache_key, tier = "hot", "Cache hit");
            return Some(response);
        }

        if let Some(response) = self.warm.get(&cache_key) {
            debug!(key = %cache_key, tier = "warm", "Cache hit, promoting to hot");
            self.hot.insert(
                cache_key,
                response.clone(),
                Duration::from_secs(self.settings.hot_ttl_sec),
                key.method,
            );
            return Some(response);
        }

        if let Some(tier) = &self.distributed {
            match tier.get::<RecommendationResponse>(&cache_key).await {
                Ok(Some(response)) => {
                    debug!(key = %cache_key, tier = "distributed", "Cache hit, promoting to hot");
                    self.hot.insert(
                        cache_key,
                        response.clone(),
                        Duration::from_secs(self.settings.hot_ttl_sec),
                        key.method,
                    );
                    return Some(response);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, key = %cache_key, "Distributed cache read failed, treating as miss");
                }
            }
        }

        None
    }

    /// Populate the tiers after a fresh computation.
    pub async fn store(
        &self,
        key: &CacheKey,
        response: &RecommendationResponse,
        compute_ms: u64,
    ) {
        let cache_key = key.key_string();
        let method = key.method;

        self.hot.insert(
            cache_key.clone(),
            response.clone(),
            Duration::from_secs(self.settings.hot_ttl_sec),
            method,
        );

        if self.meets_warm_bar(method, response.data.len(), compute_ms) {
            self.warm.insert(
                cache_key.clone(),
                response.clone(),
                Duration::from_secs(self.settings.warm_ttl_sec),
                method,
            );
        }

        if let Some(tier) = &self.distributed {
            let ttl = self.intelligent_ttl(method, response.data.len(), compute_ms);
            if let Err(e) = tier.set(&cache_key, response, ttl).await {
                warn!(error = %e, key = %cache_key, "Distributed cache write failed, continuing uncached");
            }
        }
    }

    /// Warm tier only holds results worth a longer life: enough entries,
    /// computed quickly, and not collaborative (too volatile for long-lived
    /// caching).
    fn meets_warm_bar(
        &self,
        method: RecommendationMethod,
        result_count: usize,
        compute_ms: u64,
    ) -> bool {
        result_count >= self.settings.warm_min_results
            && compute_ms < self.settings.warm_max_compute_ms
            && method != RecommendationMethod::Collaborative
    }

    fn base_ttl(&self, method: RecommendationMethod) -> u64 {
        match method {
            RecommendationMethod::ContentBased => self.settings.content_ttl_sec,
            RecommendationMethod::Collaborative => self.settings.collaborative_ttl_sec,
            RecommendationMethod::Popularity => self.settings.popularity_ttl_sec,
            RecommendationMethod::LocationBased => self.settings.location_ttl_sec,
            RecommendationMethod::Hybrid => self.settings.hybrid_ttl_sec,
        }
    }

    fn max_base_ttl(&self) -> u64 {
        self.settings
            .content_ttl_sec
            .max(self.settings.collaborative_ttl_sec)
            .max(self.settings.popularity_ttl_sec)
            .max(self.settings.location_ttl_sec)
            .max(self.settings.hybrid_ttl_sec)
    }

    /// Rich or expensive results are worth caching longer: up to 1.5x for
    /// large result sets and 1.5x again for slow computations, capped at
    /// twice the longest base TTL.
    fn intelligent_ttl(
        &self,
        method: RecommendationMethod,
        result_count: usize,
        compute_ms: u64,
    ) -> u64 {
        let mut ttl = self.base_ttl(method) as f64;
        if result_count >= self.settings.rich_result_count {
            ttl *= 1.5;
        }
        if compute_ms > self.settings.slow_compute_ms {
            ttl *= 1.5;
        }
        (ttl as u64).min(self.max_base_ttl() * 2)
    }

    /// Remove every cached entry referencing the room, across all tiers.
    pub async fn invalidate_room(&self, room_id: Uuid) -> u64 {
        self.invalidate_id(room_id).await
    }

    /// Remove every cached entry referencing the user, across all tiers.
    pub async fn invalidate_user(&self, user_id: Uuid) -> u64 {
        self.invalidate_id(user_id).await
    }

    async fn invalidate_id(&self, id: Uuid) -> u64 {
        let segment = format!(":{id}:");
        let mut removed =
            (self.hot.remove_where(|k| k.contains(&segment)) +
             self.warm.remove_where(|k| k.contains(&segment))) as u64;

        if let Some(tier) = &self.distributed {
            match tier.delete_pattern(&format!("reco:*{id}*")).await {
                Ok(count) => removed += count,
                Err(e) => {
                    warn!(error = %e, id = %id, "Distributed cache invalidation failed");
                }
            }
        }

        debug!(id = %id, removed = %removed, "Invalidated cache entries");
        removed
    }

    pub async fn stats(&self) -> CacheStatsReport {
        let distributed = match &self.distributed {
            Some(tier) => match tier.stats().await {
                Ok(stats) => Some(stats),
                Err(e) => {
                    warn!(error = %e, "Distributed cache stats unavailable");
                    None
                }
            },
            None => None,
        };

        CacheStatsReport {
            hot: self.hot.stats(),
            warm: self.warm.stats(),
            distributed,
        }
    }

    pub async fn distributed_healthy(&self) -> Option<bool> {
        match &self.distributed {
            Some(tier) => Some(tier.ping().await.unwrap_or(false)),
            None => None,
        }
    }
}

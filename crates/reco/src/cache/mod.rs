//! Multi-tier recommendation cache.
//!
//! Three tiers checked in order: a small hot tier and a larger warm tier
//! in-process, then a Redis tier shared across instances. Keys are
//! readable, segment-structured strings so invalidation can match on the
//! room or user id embedded in them.

pub mod memory;
pub mod redis;
pub mod tiered;

pub use memory::MemoryTier;
pub use redis::DistributedTier;
pub use tiered::RecommendationCache;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::RecommendationMethod;

/// Error types for cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis connection error: {0}")]
    Connection(#[from] ::redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache operation failed: {0}")]
    Operation(String),
}

/// Structured cache key: method, target room, caller, and a time bucket
/// that rotates keys without explicit invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub method: RecommendationMethod,
    pub room_id: Uuid,
    pub caller: Option<Uuid>,
    pub bucket: i64,
}

impl CacheKey {
    pub fn new(
        method: RecommendationMethod,
        room_id: Uuid,
        caller: Option<Uuid>,
        now: chrono::DateTime<chrono::Utc>,
        bucket_sec: i64,
    ) -> Self {
        Self {
            method,
            room_id,
            caller,
            bucket: now.timestamp() / bucket_sec.max(1),
        }
    }

    fn caller_segment(&self) -> String {
        self.caller
            .map(|id| id.to_string())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    /// `reco:{method}:{room}:{caller}:{bucket}`, shared by all tiers.
    pub fn key_string(&self) -> String {
        format!(
            "reco:{}:{}:{}:{}",
            self.method.as_str(),
            self.room_id,
            self.caller_segment(),
            self.bucket
        )
    }
}

/// Point-in-time statistics for one tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierStats {
    pub name: String,
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

impl TierStats {
    pub fn new(name: &str, entries: u64, hits: u64, misses: u64, evictions: u64) -> Self {
        let lookups = hits + misses;
        let hit_rate = if lookups > 0 {
            hits as f64 / lookups as f64
        } else {
            0.0
        };
        Self {
            name: name.to_string(),
            entries,
            hits,
            misses,
            evictions,
            hit_rate,
        }
    }
}

/// Per-tier cache statistics exposed by the stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatsReport {
    pub hot: TierStats,
    pub warm: TierStats,
    pub distributed: Option<TierStats>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_buckets_rotate_every_window() {
        let room = Uuid::from_u128(7);
        let t0 = chrono::Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let within = t0 + chrono::Duration::seconds(299);
        let next = t0 + chrono::Duration::seconds(300);

        let k0 = CacheKey::new(RecommendationMethod::Hybrid, room, None, t0, 300);
        let k1 = CacheKey::new(RecommendationMethod::Hybrid, room, None, within, 300);
        let k2 = CacheKey::new(RecommendationMethod::Hybrid, room, None, next, 300);

        assert_eq!(k0.key_string(), k1.key_string());
        assert_ne!(k0.key_string(), k2.key_string());
    }

    #[test]
    fn anonymous_callers_share_a_segment() {
        let room = Uuid::from_u128(7);
        let now = chrono::Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let key = CacheKey::new(RecommendationMethod::ContentBased, room, None, now, 300);
        assert!(key.key_string().contains(":anonymous:"));

        let caller = Uuid::from_u128(9);
        let keyed = CacheKey::new(
            RecommendationMethod::ContentBased,
            room,
            Some(caller),
            now,
            300,
        );
        assert!(keyed.key_string().contains(&caller.to_string()));
    }

    #[test]
    fn hit_rate_handles_zero_lookups() {
        let stats = TierStats::new("hot", 0, 0, 0, 0);
        assert_eq!(stats.hit_rate, 0.0);
        let busy = TierStats::new("hot", 5, 3, 1, 0);
        assert!((busy.hit_rate - 0.75).abs() < 1e-12);
    }
}

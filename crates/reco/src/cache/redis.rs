//! Distributed cache tier backed by Redis.
//!
//! Shared across service instances; the 5-minute time bucket in the key
//! rotates entries naturally, and id-based invalidation deletes by key
//! pattern. All failures surface as [`CacheError`] so the chain can treat
//! them as misses.

use std::sync::atomic::{AtomicU64, Ordering};

use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use super::{CacheError, TierStats};

pub struct DistributedTier {
    manager: ConnectionManager,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DistributedTier {
    /// Connect and verify the instance responds before the tier is used.
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        info!(redis_url = %redis_url, "Connecting distributed cache tier");

        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;

        let mut conn = manager.clone();
        let response: String = redis::cmd("PING").query_async(&mut conn).await?;
        if response != "PONG" {
            return Err(CacheError::Operation(format!(
                "unexpected PING response: {response}"
            )));
        }

        Ok(Self {
            manager,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(json) => {
                debug!(key = %key, "Distributed cache hit");
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => {
                debug!(key = %key, "Distributed cache miss");
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_sec: u64,
    ) -> Result<(), CacheError> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.manager.clone();
        let _: () = conn.set_ex(key, json, ttl_sec).await?;
        debug!(key = %key, ttl = %ttl_sec, "Distributed cache set");
        Ok(())
    }

    /// Delete every key matching the pattern; returns the number removed.
    pub async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut conn = self.manager.clone();

        let keys: Vec<String> = conn.keys(pattern).await?;
        if keys.is_empty() {
            debug!(pattern = %pattern, "No keys matched pattern");
            return Ok(0);
        }

        let count: u64 = conn.del(&keys).await?;
        info!(pattern = %pattern, deleted = %count, "Deleted keys by pattern");
        Ok(count)
    }

    pub async fn ping(&self) -> Result<bool, CacheError> {
        let mut conn = self.manager.clone();
        let response: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(response == "PONG")
    }

    pub async fn stats(&self) -> Result<TierStats, CacheError> {
        let mut conn = self.manager.clone();
        let entries: u64 = redis::cmd("DBSIZE").query_async(&mut conn).await?;

        Ok(TierStats::new(
            "distributed",
            entries,
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            0,
        ))
    }
}

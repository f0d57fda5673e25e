//! Recommendation service configuration.
//!
//! Every hand-tuned threshold in the engine lives here with a default, so
//! deployments override only what they measure. Loaded from an optional
//! `config/reco` file layered under `RECO_`-prefixed environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::SimilarityWeights;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RecoConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub collaborative: CollaborativeConfig,

    #[serde(default)]
    pub hybrid: HybridConfig,

    #[serde(default)]
    pub telemetry: TelemetrySettings,

    #[serde(default)]
    pub compare: CompareConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,

    /// Server port (default: 8083)
    pub port: u16,

    /// Worker threads
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8083,
            workers: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    pub max_connections: u32,

    pub connect_timeout_sec: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/roomhub".to_string(),
            max_connections: 10,
            connect_timeout_sec: 5,
        }
    }
}

/// Multi-tier cache policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    /// Redis URL for the distributed tier; unset runs in-process only.
    pub redis_url: Option<String>,

    /// Hot tier: small and short-lived.
    pub hot_capacity: usize,
    pub hot_ttl_sec: u64,

    /// Warm tier: larger bound, longer TTL.
    pub warm_capacity: usize,
    pub warm_ttl_sec: u64,

    /// Time-bucket width for key rotation (default: 5 minutes).
    pub time_bucket_sec: i64,

    /// Per-method base TTLs. Content-based results are the most stable,
    /// collaborative the most volatile.
    pub content_ttl_sec: u64,
    pub collaborative_ttl_sec: u64,
    pub popularity_ttl_sec: u64,
    pub location_ttl_sec: u64,
    pub hybrid_ttl_sec: u64,

    /// Warm-tier quality bar.
    pub warm_min_results: usize,
    pub warm_max_compute_ms: u64,

    /// TTL multipliers kick in at these points.
    pub rich_result_count: usize,
    pub slow_compute_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            hot_capacity: 128,
            hot_ttl_sec: 60,
            warm_capacity: 512,
            warm_ttl_sec: 300,
            time_bucket_sec: 300,
            content_ttl_sec: 900,
            collaborative_ttl_sec: 300,
            popularity_ttl_sec: 600,
            location_ttl_sec: 600,
            hybrid_ttl_sec: 600,
            warm_min_results: 3,
            warm_max_compute_ms: 500,
            rich_result_count: 8,
            slow_compute_ms: 500,
        }
    }
}

/// Content similarity tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoringConfig {
    /// Distance at or under which the location score is 1.0.
    pub close_distance_m: f64,

    /// "Very close" explanation threshold.
    pub very_close_distance_m: f64,

    /// Distance at or beyond which the location score is 0.0.
    pub max_distance_m: f64,

    pub price_variance: f64,
    pub area_variance: f64,

    /// Candidates fetched per requested result, to survive scoring and
    /// diversification discards.
    pub over_fetch_factor: usize,

    /// Prefer the single-round-trip candidate query.
    pub use_bulk_query: bool,

    pub weights: SimilarityWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            close_distance_m: 500.0,
            very_close_distance_m: 1000.0,
            max_distance_m: 5000.0,
            price_variance: 0.3,
            area_variance: 0.4,
            over_fetch_factor: 5,
            use_bulk_query: true,
            weights: SimilarityWeights::default(),
        }
    }
}

/// Collaborative filtering bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollaborativeConfig {
    /// Below this many qualifying caller interactions, degrade to
    /// content-based scoring.
    pub min_caller_interactions: usize,

    pub similar_user_limit: usize,

    /// The similar-user scan only considers this many recently active users.
    pub active_user_scan_limit: usize,

    pub scan_timeout_ms: u64,

    pub min_user_similarity: f64,

    /// Minimum supporting similar users per recommended room.
    pub min_supporters: usize,

    /// Confidence stops growing past this many supporters.
    pub supporter_confidence_cap: usize,
}

impl Default for CollaborativeConfig {
    fn default() -> Self {
        Self {
            min_caller_interactions: 3,
            similar_user_limit: 20,
            active_user_scan_limit: 100,
            scan_timeout_ms: 2_000,
            min_user_similarity: 0.2,
            min_supporters: 2,
            supporter_confidence_cap: 5,
        }
    }
}

/// Hybrid base weights before context adjustment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HybridConfig {
    pub content_weight: f64,
    pub collaborative_weight: f64,
    pub popularity_weight: f64,
    pub location_weight: f64,

    /// Branches below this adjusted weight are skipped entirely.
    pub min_branch_weight: f64,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            content_weight: 0.4,
            collaborative_weight: 0.2,
            popularity_weight: 0.2,
            location_weight: 0.2,
            min_branch_weight: 0.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetrySettings {
    /// Queries above this land in the per-day slow list.
    pub slow_query_ms: u64,

    /// Queries above this emit an immediate warning.
    pub very_slow_query_ms: u64,

    pub retention_days: i64,
    pub purge_interval_sec: u64,

    pub degraded_avg_ms: f64,
    pub unhealthy_avg_ms: f64,
    pub degraded_hit_rate: f64,
    pub unhealthy_hit_rate: f64,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            slow_query_ms: 1_000,
            very_slow_query_ms: 2_000,
            retention_days: 30,
            purge_interval_sec: 3_600,
            degraded_avg_ms: 1_000.0,
            unhealthy_avg_ms: 2_000.0,
            degraded_hit_rate: 0.7,
            unhealthy_hit_rate: 0.5,
        }
    }
}

/// Text-completion service used for the multi-room comparison narrative.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompareConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_ms: u64,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_ms: 8_000,
        }
    }
}

impl RecoConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/reco").required(false))
            .add_source(config::Environment::with_prefix("RECO").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn collaborative_scan_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborative.scan_timeout_ms)
    }

    pub fn compare_timeout(&self) -> Duration {
        Duration::from_millis(self.compare.timeout_ms)
    }
}

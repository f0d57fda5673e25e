//! RoomHub recommendation engine.
//!
//! Given a room, returns a ranked list of similar and relevant rooms using
//! a hybrid of content similarity, collaborative filtering, popularity,
//! and location proximity, served through a three-tier cache with online
//! performance tracking.

pub mod cache;
pub mod compare;
pub mod config;
pub mod diversity;
pub mod engine;
pub mod error;
pub mod hybrid;
pub mod repository;
pub mod scoring;
pub mod server;
pub mod telemetry;
pub mod types;

// Re-export key types
pub use cache::{CacheStatsReport, DistributedTier, MemoryTier, RecommendationCache};
pub use compare::{HttpTextGenerator, RoomComparator, TextGenerator};
pub use config::RecoConfig;
pub use engine::{
    DbWeightProvider, RecommendationRequest, RecommendationService, StaticWeightProvider,
    WeightProvider,
};
pub use error::RecoError;
pub use hybrid::{derive_weights, HybridOrchestrator, MethodWeights, RequestContext};
pub use repository::{PgRoomStore, RoomStore};
pub use telemetry::{HealthReport, HealthStatus, PerformanceReport, PerformanceTracker};
pub use types::*;

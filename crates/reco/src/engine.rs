//! Recommendation service facade.
//!
//! Owns the full request path: cache lookup, candidate retrieval, method
//! dispatch (with every degradation rule), diversification, cache
//! write-back, and fire-and-forget telemetry. Transport handlers stay
//! thin adapters over this type.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::cache::{CacheStatsReport, RecommendationCache};
use crate::compare::RoomComparator;
use crate::config::RecoConfig;
use crate::diversity;
use crate::error::RecoError;
use crate::hybrid::HybridOrchestrator;
use crate::repository::RoomStore;
use crate::scoring::{
    self, ContentBasedScorer, LocationScorer, PopularityScorer, ScoredRoom, ScoringParams,
};
use crate::telemetry::{HealthReport, PerformanceReport, PerformanceTracker, QueryRecord};
use crate::types::{
    Candidate, ClickEvent, InteractionKind, RecommendationMetadata, RecommendationMethod,
    RecommendationResponse, Room, SimilarityWeights, TargetRoomSnapshot,
};

const MAX_LIMIT: usize = 50;

/// Parameters of one recommendation call, defaults already documented on
/// the wire contract: limit 8, method HYBRID.
#[derive(Debug, Clone)]
pub struct RecommendationRequest {
    pub room_id: Uuid,
    pub limit: usize,
    pub method: RecommendationMethod,
    pub max_distance_m: Option<f64>,
    pub price_variance: Option<f64>,
    pub area_variance: Option<f64>,
    pub caller_id: Option<Uuid>,
}

impl RecommendationRequest {
    pub fn new(room_id: Uuid) -> Self {
        Self {
            room_id,
            limit: 8,
            method: RecommendationMethod::Hybrid,
            max_distance_m: None,
            price_variance: None,
            area_variance: None,
            caller_id: None,
        }
    }
}

/// Capability resolving the active similarity weights once per request.
#[async_trait]
pub trait WeightProvider: Send + Sync {
    async fn similarity_weights(&self) -> SimilarityWeights;
}

/// Config-backed weights, fixed for the process lifetime.
pub struct StaticWeightProvider {
    weights: SimilarityWeights,
}

impl StaticWeightProvider {
    pub fn new(weights: SimilarityWeights) -> Self {
        Self {
            weights: weights.normalized(),
        }
    }
}

#[async_trait]
impl WeightProvider for StaticWeightProvider {
    async fn similarity_weights(&self) -> SimilarityWeights {
        self.weights
    }
}

/// Weights read from the platform settings store, falling back to the
/// configured defaults when unset or unreadable.
pub struct DbWeightProvider {
    store: Arc<dyn RoomStore>,
    fallback: SimilarityWeights,
}

impl DbWeightProvider {
    pub fn new(store: Arc<dyn RoomStore>, fallback: SimilarityWeights) -> Self {
        Self {
            store,
            fallback: fallback.normalized(),
        }
    }
}

#[async_trait]
impl WeightProvider for DbWeightProvider {
    async fn similarity_weights(&self) -> SimilarityWeights {
        match self.store.similarity_weight_settings().await {
            Ok(Some(weights)) => weights.normalized(),
            Ok(None) => self.fallback,
            Err(e) => {
                warn!(error = %e, "Failed to read weight settings, using configured defaults");
                self.fallback
            }
        }
    }
}

pub struct RecommendationService {
    store: Arc<dyn RoomStore>,
    cache: Arc<RecommendationCache>,
    tracker: Arc<PerformanceTracker>,
    weights: Arc<dyn WeightProvider>,
    comparator: RoomComparator,
    hybrid: HybridOrchestrator,
    config: Arc<RecoConfig>,
}

impl RecommendationService {
    pub fn new(
        store: Arc<dyn RoomStore>,
        cache: Arc<RecommendationCache>,
        tracker: Arc<PerformanceTracker>,
        weights: Arc<dyn WeightProvider>,
        comparator: RoomComparator,
        config: Arc<RecoConfig>,
    ) -> Self {
        let hybrid = HybridOrchestrator::new(Arc::clone(&store), Arc::clone(&config));
        Self {
            store,
            cache,
            tracker,
            weights,
            comparator,
            hybrid,
            config,
        }
    }

    /// The primary inbound call. Walks the cache tiers first; on a full
    /// miss, retrieves candidates, scores them with the requested method,
    /// diversifies, caches, and reports telemetry.
    #[instrument(skip(self), fields(room_id = %request.room_id, method = %request.method))]
    pub async fn get_recommendations(
        &self,
        request: &RecommendationRequest,
    ) -> Result<RecommendationResponse, RecoError> {
        let started = Instant::now();
        let limit = request.limit.clamp(1, MAX_LIMIT);

        let target = match self.store.target_room(request.room_id).await {
            Ok(Some(room)) => room,
            Ok(None) => return Err(RecoError::RoomNotFound(request.room_id)),
            Err(e) => {
                self.tracker.record_error(request.method);
                return Err(e.into());
            }
        };

        let key = self
            .cache
            .key(request.method, request.room_id, request.caller_id, Utc::now());
        if let Some(cached) = self.cache.lookup(&key).await {
            self.report(QueryRecord {
                method: cached.metadata.method_used,
                execution_ms: started.elapsed().as_millis() as u64,
                result_count: cached.data.len(),
                cache_hit: true,
                room_id: request.room_id,
                caller_id: request.caller_id,
            });
            return Ok(cached);
        }

        let weights = self.weights.similarity_weights().await;
        let params = self.scoring_params(request);

        let fetch_limit = (limit * self.config.scoring.over_fetch_factor) as i64;
        let candidate_result = if self.config.scoring.use_bulk_query {
            self.store
                .candidates_bulk(&target, fetch_limit, request.caller_id, params.max_distance_m)
                .await
        } else {
            self.store
                .candidates(target.id, fetch_limit, request.caller_id)
                .await
        };
        let candidates = match candidate_result {
            Ok(candidates) => candidates,
            Err(e) => {
                self.tracker.record_error(request.method);
                return Err(e.into());
            }
        };
        debug!(candidate_count = candidates.len(), "Retrieved candidates");

        let caller_rooms = match request.caller_id {
            Some(caller) => match self.store.user_room_weights(caller).await {
                Ok(rooms) => rooms,
                Err(e) => {
                    warn!(error = %e, "Caller history unavailable, scoring anonymously");
                    HashMap::new()
                }
            },
            None => HashMap::new(),
        };

        let (ranked, method_used) = self
            .compute(request, &target, &candidates, &caller_rooms, &weights, &params)
            .await;

        let diversified = diversity::apply(ranked, limit);
        let data = scoring::into_recommendations(diversified);
        let execution_time_ms = started.elapsed().as_millis() as u64;

        let response = RecommendationResponse {
            metadata: RecommendationMetadata {
                candidate_count: candidates.len(),
                method_used,
                execution_time_ms,
                weights,
                target: TargetRoomSnapshot::from(&target),
            },
            data,
        };

        self.cache.store(&key, &response, execution_time_ms).await;
        self.report(QueryRecord {
            method: method_used,
            execution_ms: execution_time_ms,
            result_count: response.data.len(),
            cache_hit: false,
            room_id: request.room_id,
            caller_id: request.caller_id,
        });

        Ok(response)
    }

    /// Dispatch to the requested strategy. Collaborative without enough
    /// caller history and location without target coordinates both degrade
    /// to content-based scoring; a failed hybrid pipeline falls back to
    /// content-based rather than erroring.
    async fn compute(
        &self,
        request: &RecommendationRequest,
        target: &Room,
        candidates: &[Candidate],
        caller_rooms: &HashMap<Uuid, f64>,
        weights: &SimilarityWeights,
        params: &ScoringParams,
    ) -> (Vec<ScoredRoom>, RecommendationMethod) {
        match request.method {
            RecommendationMethod::ContentBased => (
                ContentBasedScorer::rank(target, candidates, weights, params),
                RecommendationMethod::ContentBased,
            ),
            RecommendationMethod::Popularity => (
                PopularityScorer::rank(target, candidates, weights, params),
                RecommendationMethod::Popularity,
            ),
            RecommendationMethod::LocationBased => {
                if target.coordinates().is_some() {
                    (
                        LocationScorer::rank(target, candidates, weights, params),
                        RecommendationMethod::LocationBased,
                    )
                } else {
                    debug!("Target has no coordinates, using content-based scoring");
                    (
                        ContentBasedScorer::rank(target, candidates, weights, params),
                        RecommendationMethod::ContentBased,
                    )
                }
            }
            RecommendationMethod::Collaborative => {
                self.compute_collaborative(request, target, candidates, caller_rooms, weights, params)
                    .await
            }
            RecommendationMethod::Hybrid => {
                match self
                    .hybrid
                    .recommend(
                        target,
                        candidates,
                        request.caller_id,
                        caller_rooms,
                        weights,
                        params,
                    )
                    .await
                {
                    Ok(ranked) => (ranked, RecommendationMethod::Hybrid),
                    Err(e) => {
                        warn!(error = %e, "Hybrid pipeline failed, falling back to content-based");
                        (
                            ContentBasedScorer::rank(target, candidates, weights, params),
                            RecommendationMethod::ContentBased,
                        )
                    }
                }
            }
        }
    }

    async fn compute_collaborative(
        &self,
        request: &RecommendationRequest,
        target: &Room,
        candidates: &[Candidate],
        caller_rooms: &HashMap<Uuid, f64>,
        weights: &SimilarityWeights,
        params: &ScoringParams,
    ) -> (Vec<ScoredRoom>, RecommendationMethod) {
        let content_fallback = || {
            (
                ContentBasedScorer::rank(target, candidates, weights, params),
                RecommendationMethod::ContentBased,
            )
        };

        let Some(caller) = request.caller_id else {
            debug!("Collaborative scoring needs a caller identity, using content-based");
            return content_fallback();
        };
        if caller_rooms.len() < self.config.collaborative.min_caller_interactions {
            debug!(
                interactions = caller_rooms.len(),
                "Too little caller history for collaborative scoring, using content-based"
            );
            return content_fallback();
        }

        let profiles = match tokio::time::timeout(
            self.config.collaborative_scan_timeout(),
            self.store.active_user_profiles(
                Some(caller),
                self.config.collaborative.active_user_scan_limit as i64,
            ),
        )
        .await
        {
            Ok(Ok(profiles)) => profiles,
            Ok(Err(e)) => {
                warn!(error = %e, "Similar-user scan failed, using content-based");
                return content_fallback();
            }
            Err(_) => {
                warn!("Similar-user scan timed out, using content-based");
                return content_fallback();
            }
        };

        let ranked = scoring::CollaborativeScorer::rank(
            caller_rooms,
            &profiles,
            target,
            candidates,
            weights,
            params,
            &self.config.collaborative,
        );
        (ranked, RecommendationMethod::Collaborative)
    }

    fn scoring_params(&self, request: &RecommendationRequest) -> ScoringParams {
        let mut params = ScoringParams::from_config(&self.config.scoring);
        if let Some(max_distance) = request.max_distance_m {
            params.max_distance_m = max_distance.max(params.close_distance_m);
        }
        if let Some(price_variance) = request.price_variance {
            params.price_variance = price_variance.max(0.0);
        }
        if let Some(area_variance) = request.area_variance {
            params.area_variance = area_variance.max(0.0);
        }
        params
    }

    /// Telemetry is a best-effort side channel: recorded from a detached
    /// task so it can never slow down or fail the response.
    fn report(&self, record: QueryRecord) {
        let tracker = Arc::clone(&self.tracker);
        tokio::spawn(async move {
            tracker.record(record);
        });
    }

    /// Best-effort click tracking; failures are logged, never propagated.
    pub async fn track_click(&self, click: ClickEvent) {
        if let Err(e) = self.store.record_click(&click).await {
            warn!(error = %e, target = %click.target_room_id, "Failed to record recommendation click");
        }
    }

    /// Record an interaction and drop every cached entry referencing the
    /// room or the user, since interaction counts feed the popularity and
    /// collaborative scores.
    pub async fn record_interaction(
        &self,
        user_id: Uuid,
        room_id: Uuid,
        kind: InteractionKind,
    ) -> Result<(), RecoError> {
        self.store.record_interaction(user_id, room_id, kind).await?;
        self.cache.invalidate_room(room_id).await;
        self.cache.invalidate_user(user_id).await;
        Ok(())
    }

    /// Auxiliary comparison narrative over a set of rooms.
    pub async fn compare_rooms(&self, room_ids: &[Uuid]) -> Result<String, RecoError> {
        let mut rooms = Vec::with_capacity(room_ids.len());
        for id in room_ids {
            match self.store.target_room(*id).await? {
                Some(room) => rooms.push(room),
                None => return Err(RecoError::RoomNotFound(*id)),
            }
        }
        Ok(self.comparator.compare(&rooms).await)
    }

    pub async fn cache_stats(&self) -> CacheStatsReport {
        self.cache.stats().await
    }

    pub fn performance_stats(&self, days: i64) -> PerformanceReport {
        self.tracker.aggregate(days)
    }

    pub fn health(&self) -> HealthReport {
        self.tracker.health()
    }
}

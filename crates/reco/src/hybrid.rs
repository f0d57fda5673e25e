//! Hybrid orchestration: analyze the request context, derive per-method
//! weights, fan out to the scoring strategies concurrently, and merge
//! their rankings into one list.
//!
//! Branches are independent reads; a failed or skipped branch contributes
//! an empty list and never aborts the request. The combine step is
//! deterministic (stable ordering, id tie-break) so identical inputs
//! always produce identical output.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Datelike, Timelike, Utc, Weekday};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RecoConfig;
use crate::repository::RoomStore;
use crate::scoring::{
    CollaborativeScorer, ContentBasedScorer, LocationScorer, PopularityScorer, ScoredRoom,
    ScoringParams,
};
use crate::types::{Candidate, RecommendationMethod, Room, SimilarityWeights};

const HEAVY_USER_INTERACTIONS: usize = 10;
const HEAVY_USER_COLLAB_BOOST: f64 = 0.2;
const HEAVY_USER_CONTENT_PENALTY: f64 = 0.1;
const HEAVY_USER_POPULARITY_PENALTY: f64 = 0.1;
const LIGHT_USER_POPULARITY_BOOST: f64 = 0.15;
const LIGHT_USER_CONTENT_BOOST: f64 = 0.1;
const LIGHT_USER_COLLAB_PENALTY: f64 = 0.25;
const COMPLETE_ROOM_THRESHOLD: f64 = 0.8;
const COMPLETE_ROOM_CONTENT_BOOST: f64 = 0.1;
const GEO_LOCATION_BOOST: f64 = 0.1;
const OFF_HOURS_COLLAB_BOOST: f64 = 0.05;
const EVENING_START_HOUR: u32 = 18;

/// Context gathered in the ANALYZE step.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    pub interaction_count: usize,
    pub completeness: f64,
    pub has_location: bool,
    pub is_evening: bool,
    pub is_weekend: bool,
}

impl RequestContext {
    pub fn analyze(target: &Room, interaction_count: usize) -> Self {
        let now = Utc::now();
        Self {
            interaction_count,
            completeness: target.completeness(),
            has_location: target.coordinates().is_some(),
            is_evening: now.hour() >= EVENING_START_HOUR,
            is_weekend: matches!(now.weekday(), Weekday::Sat | Weekday::Sun),
        }
    }
}

/// Per-branch weights after context adjustment, always summing to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MethodWeights {
    pub content: f64,
    pub collaborative: f64,
    pub popularity: f64,
    pub location: f64,
}

impl MethodWeights {
    fn normalized(self) -> Self {
        let clamped = Self {
            content: self.content.max(0.0),
            collaborative: self.collaborative.max(0.0),
            popularity: self.popularity.max(0.0),
            location: self.location.max(0.0),
        };
        let sum = clamped.content + clamped.collaborative + clamped.popularity + clamped.location;
        if sum <= f64::EPSILON {
            return Self {
                content: 1.0,
                collaborative: 0.0,
                popularity: 0.0,
                location: 0.0,
            };
        }
        Self {
            content: clamped.content / sum,
            collaborative: clamped.collaborative / sum,
            popularity: clamped.popularity / sum,
            location: clamped.location / sum,
        }
    }

    pub fn sum(&self) -> f64 {
        self.content + self.collaborative + self.popularity + self.location
    }
}

/// Derive branch weights from the base configuration and request context.
pub fn derive_weights(
    config: &RecoConfig,
    ctx: &RequestContext,
) -> MethodWeights {
    let base = &config.hybrid;
    let mut weights = MethodWeights {
        content: base.content_weight,
        collaborative: base.collaborative_weight,
        popularity: base.popularity_weight,
        location: base.location_weight,
    };

    if ctx.interaction_count > HEAVY_USER_INTERACTIONS {
        weights.collaborative += HEAVY_USER_COLLAB_BOOST;
        weights.content -= HEAVY_USER_CONTENT_PENALTY;
        weights.popularity -= HEAVY_USER_POPULARITY_PENALTY;
    } else if ctx.interaction_count < config.collaborative.min_caller_interactions {
        weights.popularity += LIGHT_USER_POPULARITY_BOOST;
        weights.content += LIGHT_USER_CONTENT_BOOST;
        weights.collaborative -= LIGHT_USER_COLLAB_PENALTY;
    }

    if ctx.completeness > COMPLETE_ROOM_THRESHOLD {
        weights.content += COMPLETE_ROOM_CONTENT_BOOST;
    }
    if ctx.has_location {
        weights.location += GEO_LOCATION_BOOST;
    }
    if ctx.is_evening || ctx.is_weekend {
        weights.collaborative += OFF_HOURS_COLLAB_BOOST;
    }

    weights.normalized()
}

pub struct HybridOrchestrator {
    store: Arc<dyn RoomStore>,
    config: Arc<RecoConfig>,
}

impl HybridOrchestrator {
    pub fn new(store: Arc<dyn RoomStore>, config: Arc<RecoConfig>) -> Self {
        Self { store, config }
    }

    /// Run ANALYZE → WEIGHT → FAN-OUT → COMBINE. Diversification happens
    /// after, shared with the single-method paths.
    pub async fn recommend(
        &self,
        target: &Room,
        candidates: &[Candidate],
        caller: Option<Uuid>,
        caller_rooms: &HashMap<Uuid, f64>,
        weights: &SimilarityWeights,
        params: &ScoringParams,
    ) -> Result<Vec<ScoredRoom>> {
        let ctx = RequestContext::analyze(target, caller_rooms.len());
        let branch_weights = derive_weights(&self.config, &ctx);
        let min_weight = self.config.hybrid.min_branch_weight;

        debug!(
            content = branch_weights.content,
            collaborative = branch_weights.collaborative,
            popularity = branch_weights.popularity,
            location = branch_weights.location,
            interaction_count = ctx.interaction_count,
            completeness = ctx.completeness,
            "Derived hybrid branch weights"
        );

        let content_branch = async {
            Ok::<_, anyhow::Error>(ContentBasedScorer::rank(target, candidates, weights, params))
        };

        let collaborative_branch = async {
            if caller.is_none() || branch_weights.collaborative <= min_weight {
                return Ok::<_, anyhow::Error>(Vec::new());
            }
            if caller_rooms.len() < self.config.collaborative.min_caller_interactions {
                return Ok(Vec::new());
            }
            let profiles = tokio::time::timeout(
                self.config.collaborative_scan_timeout(),
                self.store.active_user_profiles(
                    caller,
                    self.config.collaborative.active_user_scan_limit as i64,
                ),
            )
            .await
            .map_err(|_| anyhow::anyhow!("similar-user scan timed out"))??;

            Ok(CollaborativeScorer::rank(
                caller_rooms,
                &profiles,
                target,
                candidates,
                weights,
                params,
                &self.config.collaborative,
            ))
        };

        let popularity_branch = async {
            if branch_weights.popularity <= min_weight {
                return Ok::<_, anyhow::Error>(Vec::new());
            }
            Ok(PopularityScorer::rank(target, candidates, weights, params))
        };

        let location_branch = async {
            if !ctx.has_location || branch_weights.location <= min_weight {
                return Ok::<_, anyhow::Error>(Vec::new());
            }
            Ok(LocationScorer::rank(target, candidates, weights, params))
        };

        let (content, collaborative, popularity, location) = tokio::join!(
            content_branch,
            collaborative_branch,
            popularity_branch,
            location_branch
        );

        let settle = |label: &str, outcome: Result<Vec<ScoredRoom>>| match outcome {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, branch = label, "Scoring branch failed, contributing nothing");
                Vec::new()
            }
        };

        let branches = vec![
            (
                RecommendationMethod::ContentBased,
                branch_weights.content,
                settle("content", content),
            ),
            (
                RecommendationMethod::Collaborative,
                branch_weights.collaborative,
                settle("collaborative", collaborative),
            ),
            (
                RecommendationMethod::Popularity,
                branch_weights.popularity,
                settle("popularity", popularity),
            ),
            (
                RecommendationMethod::LocationBased,
                branch_weights.location,
                settle("location", location),
            ),
        ];

        Ok(combine(branches))
    }
}

struct CombinedEntry {
    scored: ScoredRoom,
    sources: Vec<&'static str>,
}

/// Merge branch rankings: every room accumulates
/// `branch_score x position_score x branch_weight`, where earlier ranks in
/// a branch contribute more. The final score is capped at 1.0.
fn combine(
    branches: Vec<(RecommendationMethod, f64, Vec<ScoredRoom>)>,
) -> Vec<ScoredRoom> {
    let mut merged: HashMap<Uuid, CombinedEntry> = HashMap::new();

    for (method, weight, results) in branches {
        let branch_len = results.len();
        for (index, scored) in results.into_iter().enumerate() {
            let position_score = 1.0 - index as f64 / branch_len as f64;
            let contribution = scored.score * position_score * weight;

            match merged.entry(scored.room.id) {
                std::collections::hash_map::Entry::Occupied(mut entry) => {
                    let combined = entry.get_mut();
                    combined.scored.score += contribution;
                    combined.sources.push(method_label(method));
                    for reason in scored.reasons {
                        if !combined.scored.reasons.contains(&reason) {
                            combined.scored.reasons.push(reason);
                        }
                    }
                }
                std::collections::hash_map::Entry::Vacant(entry) => {
                    let mut seeded = scored;
                    seeded.score = contribution;
                    seeded.method = RecommendationMethod::Hybrid;
                    entry.insert(CombinedEntry {
                        scored: seeded,
                        sources: vec![method_label(method)],
                    });
                }
            }
        }
    }

    let mut combined: Vec<ScoredRoom> = merged
        .into_values()
        .map(|mut entry| {
            entry.scored.score = entry.scored.score.min(1.0);
            entry
                .scored
                .reasons
                .push(format!("Matched by {} signals", entry.sources.join(" + ")));
            entry.scored
        })
        .collect();

    crate::scoring::sort_ranked(&mut combined);
    combined
}

fn method_label(method: RecommendationMethod) -> &'static str {
    match method {
        RecommendationMethod::ContentBased => "content",
        RecommendationMethod::Collaborative => "collaborative",
        RecommendationMethod::Popularity => "popularity",
        RecommendationMethod::LocationBased => "location",
        RecommendationMethod::Hybrid => "hybrid",
    }
}

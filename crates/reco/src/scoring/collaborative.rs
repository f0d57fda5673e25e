//! Collaborative strategy: score rooms by the behavior of users whose
//! interaction history overlaps the caller's.
//!
//! The similar-user scan is bounded upstream (most recently active users
//! only, with a timeout); this module is pure over the prefetched
//! profiles so the heavy part stays cancellable.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::config::CollaborativeConfig;
use crate::types::{
    Candidate, InteractionKind, RecommendationMethod, Room, SimilarityWeights,
    UserInteractionProfile,
};

use super::similarity::{self, ScoringParams};
use super::{sort_ranked, ScoredRoom};

pub struct CollaborativeScorer;

struct SimilarUser<'a> {
    similarity: f64,
    profile: &'a UserInteractionProfile,
}

impl CollaborativeScorer {
    /// Rank candidates from similar-user support. Returns an empty list
    /// when no user clears the similarity threshold or no room gathers
    /// enough supporters; the caller treats that as a degraded branch.
    pub fn rank(
        caller_rooms: &HashMap<Uuid, f64>,
        profiles: &[UserInteractionProfile],
        target: &Room,
        candidates: &[Candidate],
        weights: &SimilarityWeights,
        params: &ScoringParams,
        cfg: &CollaborativeConfig,
    ) -> Vec<ScoredRoom> {
        let caller_set: HashSet<Uuid> = caller_rooms.keys().copied().collect();
        let similar = Self::similar_users(&caller_set, profiles, cfg);
        if similar.is_empty() {
            return Vec::new();
        }

        let total_similarity: f64 = similar.iter().map(|s| s.similarity).sum();
        // Normalizing against the strongest possible interaction keeps the
        // accumulated score inside [0, 1] before the confidence factor.
        let max_interaction_weight = InteractionKind::RentalRequest.weight();

        let mut results = Vec::new();
        for candidate in candidates {
            let mut raw = 0.0;
            let mut supporters = 0usize;
            for user in &similar {
                if let Some(weight) = user.profile.room_weights.get(&candidate.room.id) {
                    raw += user.similarity * weight;
                    supporters += 1;
                }
            }
            if supporters < cfg.min_supporters {
                continue;
            }

            let normalized = raw / (total_similarity * max_interaction_weight);
            let confidence = supporters.min(cfg.supporter_confidence_cap) as f64
                / cfg.supporter_confidence_cap as f64;
            let score = (normalized * confidence).clamp(0.0, 1.0);

            let breakdown =
                similarity::similarity_breakdown(target, &candidate.room, weights, params);
            let reasons = vec![
                "Liked by renters with similar interests".to_string(),
                format!("{supporters} similar renters engaged with this room"),
            ];

            results.push(ScoredRoom {
                room: candidate.room.clone(),
                score,
                breakdown,
                reasons,
                method: RecommendationMethod::Collaborative,
            });
        }

        sort_ranked(&mut results);
        results
    }

    fn similar_users<'a>(
        caller_set: &HashSet<Uuid>,
        profiles: &'a [UserInteractionProfile],
        cfg: &CollaborativeConfig,
    ) -> Vec<SimilarUser<'a>> {
        let mut similar: Vec<SimilarUser<'a>> = profiles
            .iter()
            .filter_map(|profile| {
                let similarity = similarity::jaccard_ids(caller_set, &profile.room_set());
                (similarity > cfg.min_user_similarity).then_some(SimilarUser {
                    similarity,
                    profile,
                })
            })
            .collect();

        similar.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.profile.user_id.cmp(&b.profile.user_id))
        });
        similar.truncate(cfg.similar_user_limit);
        similar
    }
}

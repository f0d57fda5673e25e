//! Popularity strategy: weighted interaction counts over the rolling
//! window, with a newest-first fallback when nothing has been engaged.

use crate::types::{Candidate, RecommendationMethod, Room, SimilarityWeights};

use super::similarity::{self, ScoringParams};
use super::ScoredRoom;

/// Popularity carries no per-pair similarity signal; every popular room is
/// surfaced at the same fixed score.
const POPULARITY_SCORE: f64 = 0.5;

pub struct PopularityScorer;

impl PopularityScorer {
    pub fn rank(
        target: &Room,
        candidates: &[Candidate],
        weights: &SimilarityWeights,
        params: &ScoringParams,
    ) -> Vec<ScoredRoom> {
        let any_engagement = candidates
            .iter()
            .any(|c| c.stats.popularity_points() > 0);

        let mut ordered: Vec<&Candidate> = candidates.iter().collect();
        if any_engagement {
            // Points descending, ties by most recent interaction, then by
            // newest room, then id for determinism.
            ordered.sort_by(|a, b| {
                b.stats
                    .popularity_points()
                    .cmp(&a.stats.popularity_points())
                    .then_with(|| b.stats.last_interaction_at.cmp(&a.stats.last_interaction_at))
                    .then_with(|| b.room.created_at.cmp(&a.room.created_at))
                    .then_with(|| a.room.id.cmp(&b.room.id))
            });
        } else {
            ordered.sort_by(|a, b| {
                b.room
                    .created_at
                    .cmp(&a.room.created_at)
                    .then_with(|| a.room.id.cmp(&b.room.id))
            });
        }

        ordered
            .into_iter()
            .map(|candidate| {
                let breakdown =
                    similarity::similarity_breakdown(target, &candidate.room, weights, params);
                let reasons = Self::reasons(candidate, any_engagement);

                ScoredRoom {
                    room: candidate.room.clone(),
                    score: POPULARITY_SCORE,
                    breakdown,
                    reasons,
                    method: RecommendationMethod::Popularity,
                }
            })
            .collect()
    }

    fn reasons(candidate: &Candidate, any_engagement: bool) -> Vec<String> {
        if !any_engagement {
            return vec!["Recently listed".to_string()];
        }
        let points = candidate.stats.popularity_points();
        let mut reasons = vec!["Popular with other renters".to_string()];
        if points > 0 {
            reasons.push(format!(
                "{} recent favorites, {} viewing requests",
                candidate.stats.favorites, candidate.stats.viewings
            ));
        }
        reasons
    }
}

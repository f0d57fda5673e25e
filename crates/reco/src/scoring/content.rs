//! Content-based strategy: rank candidates by attribute similarity alone.

use crate::types::{Candidate, RecommendationMethod, Room, SimilarityWeights};

use super::similarity::{self, ScoringParams};
use super::{content_reasons, sort_ranked, ScoredRoom};

pub struct ContentBasedScorer;

impl ContentBasedScorer {
    /// Score every candidate against the target and return them ranked.
    pub fn rank(
        target: &Room,
        candidates: &[Candidate],
        weights: &SimilarityWeights,
        params: &ScoringParams,
    ) -> Vec<ScoredRoom> {
        let mut results: Vec<ScoredRoom> = candidates
            .iter()
            .map(|candidate| {
                let breakdown =
                    similarity::similarity_breakdown(target, &candidate.room, weights, params);
                let distance = similarity::room_distance_m(target, &candidate.room);
                let shared = similarity::shared_amenities(target, &candidate.room);
                let reasons = content_reasons(&breakdown, distance, &shared, params);

                ScoredRoom {
                    room: candidate.room.clone(),
                    score: breakdown.overall,
                    breakdown,
                    reasons,
                    method: RecommendationMethod::ContentBased,
                }
            })
            .collect();

        sort_ranked(&mut results);
        results
    }
}

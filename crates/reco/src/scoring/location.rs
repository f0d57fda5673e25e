//! Location-only strategy: rank by proximity, drop anything effectively
//! out of range.

use crate::types::{Candidate, RecommendationMethod, Room, SimilarityWeights};

use super::similarity::{self, ScoringParams};
use super::{sort_ranked, ScoredRoom};

/// Rooms at or under this location score are not worth surfacing at all.
const MIN_LOCATION_SCORE: f64 = 0.1;

pub struct LocationScorer;

impl LocationScorer {
    pub fn rank(
        target: &Room,
        candidates: &[Candidate],
        weights: &SimilarityWeights,
        params: &ScoringParams,
    ) -> Vec<ScoredRoom> {
        let mut results: Vec<ScoredRoom> = candidates
            .iter()
            .filter_map(|candidate| {
                let distance = similarity::room_distance_m(target, &candidate.room)?;
                let score = similarity::location_score(distance, params);
                if score <= MIN_LOCATION_SCORE {
                    return None;
                }

                let breakdown =
                    similarity::similarity_breakdown(target, &candidate.room, weights, params);
                let reasons = vec![if distance < params.very_close_distance_m {
                    format!("Only {:.0} m away", distance)
                } else {
                    format!("{:.1} km from this room", distance / 1000.0)
                }];

                Some(ScoredRoom {
                    room: candidate.room.clone(),
                    score,
                    breakdown,
                    reasons,
                    method: RecommendationMethod::LocationBased,
                })
            })
            .collect();

        sort_ranked(&mut results);
        results
    }
}

//! Scoring strategies and shared ranking plumbing.
//!
//! Each strategy ranks candidates against the target room and returns a
//! pre-sorted list of [`ScoredRoom`]s with at least one human-readable
//! reason per entry. Strategies are pure over data the repository has
//! already fetched, so they compose freely under the hybrid orchestrator
//! and test without a database.

pub mod collaborative;
pub mod content;
pub mod location;
pub mod popularity;
pub mod similarity;

pub use collaborative::CollaborativeScorer;
pub use content::ContentBasedScorer;
pub use location::LocationScorer;
pub use popularity::PopularityScorer;
pub use similarity::ScoringParams;

use crate::types::{RecommendationMethod, RecommendedRoom, Room, SimilarityBreakdown};

/// A candidate scored by one strategy, before final ranking.
#[derive(Debug, Clone)]
pub struct ScoredRoom {
    pub room: Room,
    pub score: f64,
    pub breakdown: SimilarityBreakdown,
    pub reasons: Vec<String>,
    pub method: RecommendationMethod,
}

/// Deterministic strategy-internal ordering: score descending, ties broken
/// by room id so identical inputs always rank identically.
pub fn sort_ranked(results: &mut [ScoredRoom]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.room.id.cmp(&b.room.id))
    });
}

/// Convert a final ranked list into the response shape, assigning 1-based
/// ranks and clamping scores into [0, 1].
pub fn into_recommendations(ranked: Vec<ScoredRoom>) -> Vec<RecommendedRoom> {
    ranked
        .into_iter()
        .enumerate()
        .map(|(index, scored)| RecommendedRoom {
            room: scored.room,
            similarity_score: scored.score.clamp(0.0, 1.0),
            method: scored.method,
            reasons: scored.reasons,
            breakdown: scored.breakdown,
            rank: index + 1,
        })
        .collect()
}

/// Build explanation reasons from the breakdown thresholds. Guarantees at
/// least one reason.
pub fn content_reasons(
    breakdown: &SimilarityBreakdown,
    distance_m: Option<f64>,
    shared_amenities: &[String],
    params: &ScoringParams,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if breakdown.location > 0.8 {
        match distance_m {
            Some(d) if d < params.very_close_distance_m => {
                reasons.push("Very close to this room".to_string());
            }
            Some(_) => reasons.push("In the same area".to_string()),
            None => {}
        }
    }
    if breakdown.price > 0.8 {
        reasons.push("Priced about the same".to_string());
    }
    if breakdown.area > 0.8 {
        reasons.push("Similar floor area".to_string());
    }
    if !shared_amenities.is_empty() {
        let listed: Vec<&str> = shared_amenities
            .iter()
            .take(3)
            .map(|a| a.as_str())
            .collect();
        reasons.push(format!("Also offers {}", listed.join(", ")));
    }

    if reasons.is_empty() {
        reasons.push("Similar overall profile".to_string());
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn scored(id: u128, score: f64) -> ScoredRoom {
        ScoredRoom {
            room: Room {
                id: Uuid::from_u128(id),
                title: "r".to_string(),
                price: 1.0,
                area_m2: 1.0,
                is_available: true,
                property_id: Uuid::from_u128(id),
                latitude: None,
                longitude: None,
                amenities: vec![],
                image_count: 0,
                created_at: Utc::now(),
            },
            score,
            breakdown: SimilarityBreakdown::default(),
            reasons: vec!["r".to_string()],
            method: RecommendationMethod::ContentBased,
        }
    }

    #[test]
    fn ranking_breaks_ties_by_id() {
        let mut results = vec![scored(3, 0.5), scored(1, 0.5), scored(2, 0.9)];
        sort_ranked(&mut results);
        let ids: Vec<u128> = results.iter().map(|r| r.room.id.as_u128()).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn recommendations_get_one_based_ranks() {
        let recs = into_recommendations(vec![scored(1, 1.4), scored(2, 0.2)]);
        assert_eq!(recs[0].rank, 1);
        assert_eq!(recs[1].rank, 2);
        // scores are clamped into [0, 1]
        assert_eq!(recs[0].similarity_score, 1.0);
    }

    #[test]
    fn reasons_never_empty() {
        let params = ScoringParams {
            close_distance_m: 500.0,
            very_close_distance_m: 1000.0,
            max_distance_m: 5000.0,
            price_variance: 0.3,
            area_variance: 0.4,
        };
        let reasons = content_reasons(&SimilarityBreakdown::default(), None, &[], &params);
        assert_eq!(reasons, vec!["Similar overall profile".to_string()]);
    }

    #[test]
    fn close_distance_wording_depends_on_meters() {
        let params = ScoringParams {
            close_distance_m: 500.0,
            very_close_distance_m: 1000.0,
            max_distance_m: 5000.0,
            price_variance: 0.3,
            area_variance: 0.4,
        };
        let breakdown = SimilarityBreakdown {
            location: 0.9,
            ..Default::default()
        };
        let near = content_reasons(&breakdown, Some(400.0), &[], &params);
        assert!(near.iter().any(|r| r.contains("Very close")));
        let same_area = content_reasons(&breakdown, Some(1500.0), &[], &params);
        assert!(same_area.iter().any(|r| r.contains("same area")));
    }
}

//! Pure similarity math: great-circle distance, attribute proximity,
//! amenity overlap, and the weighted content breakdown.

use std::collections::HashSet;

use crate::types::{Room, SimilarityBreakdown, SimilarityWeights};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Per-request scoring parameters: configuration defaults with any
/// caller-supplied overrides already applied.
#[derive(Debug, Clone, Copy)]
pub struct ScoringParams {
    pub close_distance_m: f64,
    pub very_close_distance_m: f64,
    pub max_distance_m: f64,
    pub price_variance: f64,
    pub area_variance: f64,
}

impl ScoringParams {
    pub fn from_config(scoring: &crate::config::ScoringConfig) -> Self {
        Self {
            close_distance_m: scoring.close_distance_m,
            very_close_distance_m: scoring.very_close_distance_m,
            max_distance_m: scoring.max_distance_m,
            price_variance: scoring.price_variance,
            area_variance: scoring.area_variance,
        }
    }
}

/// Great-circle distance between two coordinates, in meters.
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}

/// Location score: 1.0 at or under the close threshold, 0.0 at or past the
/// maximum, linear in between. Monotonically non-increasing in distance.
pub fn location_score(distance_m: f64, params: &ScoringParams) -> f64 {
    if distance_m <= params.close_distance_m {
        1.0
    } else if distance_m >= params.max_distance_m {
        0.0
    } else {
        1.0 - (distance_m - params.close_distance_m)
            / (params.max_distance_m - params.close_distance_m)
    }
}

/// Proximity of two positive magnitudes (price or area), driven by their
/// relative difference against the pair average. Scores 1.0 when the
/// relative difference is within half the variance threshold, 0.0 at or
/// past the full threshold. Symmetric in its arguments.
pub fn proximity_score(a: f64, b: f64, variance: f64) -> f64 {
    let avg = (a + b) / 2.0;
    if avg <= 0.0 || variance <= 0.0 {
        return 0.0;
    }
    let relative = (a - b).abs() / avg;
    let half = variance / 2.0;
    if relative <= half {
        1.0
    } else if relative >= variance {
        0.0
    } else {
        (variance - relative) / (variance - half)
    }
}

/// Jaccard index over two amenity-tag sets. Two empty sets share nothing
/// worth recommending on, so both-empty scores 0.0.
pub fn amenity_score(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Jaccard index over arbitrary id sets (used for user-user similarity).
pub fn jaccard_ids(a: &HashSet<uuid::Uuid>, b: &HashSet<uuid::Uuid>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Distance between two rooms when both carry coordinates.
pub fn room_distance_m(target: &Room, candidate: &Room) -> Option<f64> {
    let (lat1, lon1) = target.coordinates()?;
    let (lat2, lon2) = candidate.coordinates()?;
    Some(haversine_distance_m(lat1, lon1, lat2, lon2))
}

/// Full content breakdown for a (target, candidate) pair. A room missing
/// coordinates scores 0.0 on the location component and still competes on
/// the remaining attributes.
pub fn similarity_breakdown(
    target: &Room,
    candidate: &Room,
    weights: &SimilarityWeights,
    params: &ScoringParams,
) -> SimilarityBreakdown {
    let location = room_distance_m(target, candidate)
        .map(|d| location_score(d, params))
        .unwrap_or(0.0);
    let price = proximity_score(target.price, candidate.price, params.price_variance);
    let area = proximity_score(target.area_m2, candidate.area_m2, params.area_variance);
    let amenities = amenity_score(&target.amenity_set(), &candidate.amenity_set());

    let overall = (location * weights.location
        + price * weights.price
        + area * weights.area
        + amenities * weights.amenities)
        .clamp(0.0, 1.0);

    SimilarityBreakdown {
        location,
        price,
        area,
        amenities,
        overall,
    }
}

/// Amenities present on both rooms, sorted for stable output.
pub fn shared_amenities(target: &Room, candidate: &Room) -> Vec<String> {
    let target_set = target.amenity_set();
    let mut shared: Vec<String> = candidate
        .amenities
        .iter()
        .filter(|a| target_set.contains(a.as_str()))
        .cloned()
        .collect();
    shared.sort();
    shared.dedup();
    shared
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn params() -> ScoringParams {
        ScoringParams {
            close_distance_m: 500.0,
            very_close_distance_m: 1000.0,
            max_distance_m: 5000.0,
            price_variance: 0.3,
            area_variance: 0.4,
        }
    }

    fn room(price: f64, area: f64, lat: Option<f64>, amenities: &[&str]) -> Room {
        Room {
            id: Uuid::new_v4(),
            title: "Test room".to_string(),
            price,
            area_m2: area,
            is_available: true,
            property_id: Uuid::new_v4(),
            latitude: lat,
            longitude: lat.map(|_| 106.7),
            amenities: amenities.iter().map(|a| a.to_string()).collect(),
            image_count: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn haversine_matches_known_distance() {
        // Ho Chi Minh City center to Tan Son Nhat airport, roughly 7 km.
        let d = haversine_distance_m(10.7769, 106.7009, 10.8188, 106.6520);
        assert!((6_000.0..8_500.0).contains(&d), "got {d}");
        assert_eq!(haversine_distance_m(10.0, 106.0, 10.0, 106.0), 0.0);
    }

    #[test]
    fn location_score_boundaries_and_monotonicity() {
        let p = params();
        assert_eq!(location_score(0.0, &p), 1.0);
        assert_eq!(location_score(500.0, &p), 1.0);
        assert_eq!(location_score(5000.0, &p), 0.0);
        assert_eq!(location_score(9000.0, &p), 0.0);

        let mut previous = 1.0;
        for step in 0..50 {
            let score = location_score(step as f64 * 200.0, &p);
            assert!(score <= previous + 1e-12);
            assert!((0.0..=1.0).contains(&score));
            previous = score;
        }
        // Midpoint between thresholds sits at half score.
        assert!((location_score(2750.0, &p) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn proximity_score_is_symmetric() {
        for (a, b) in [(2_000_000.0, 2_100_000.0), (20.0, 35.0), (1.0, 9.0)] {
            assert_eq!(proximity_score(a, b, 0.3), proximity_score(b, a, 0.3));
        }
    }

    #[test]
    fn worked_example_from_listing_flow() {
        // price 2,000,000 vs 2,100,000 at variance 0.3: relative diff
        // ~0.049 <= 0.15, full score. area 20 vs 22 at variance 0.4:
        // relative diff ~0.095 <= 0.2, full score.
        assert_eq!(proximity_score(2_000_000.0, 2_100_000.0, 0.3), 1.0);
        assert_eq!(proximity_score(20.0, 22.0, 0.4), 1.0);
    }

    #[test]
    fn proximity_score_hits_zero_past_variance() {
        // relative diff of 1.0 is far past any configured variance
        assert_eq!(proximity_score(1_000_000.0, 3_000_000.0, 0.3), 0.0);
        // between half and full variance the score is strictly inside (0, 1)
        let mid = proximity_score(2_000_000.0, 2_500_000.0, 0.3);
        assert!(mid > 0.0 && mid < 1.0, "got {mid}");
    }

    #[test]
    fn amenity_score_edges() {
        let wifi_parking: HashSet<&str> = ["wifi", "parking"].into_iter().collect();
        let same = wifi_parking.clone();
        let disjoint: HashSet<&str> = ["balcony", "pool"].into_iter().collect();
        let empty: HashSet<&str> = HashSet::new();

        assert_eq!(amenity_score(&wifi_parking, &same), 1.0);
        assert_eq!(amenity_score(&wifi_parking, &disjoint), 0.0);
        assert_eq!(amenity_score(&empty, &empty), 0.0);
        assert_eq!(amenity_score(&wifi_parking, &empty), 0.0);
    }

    #[test]
    fn jaccard_ids_worked_example() {
        let id = |n: u128| Uuid::from_u128(n);
        let a: HashSet<Uuid> = [id(1), id(2), id(3)].into_iter().collect();
        let b: HashSet<Uuid> = [id(2), id(3), id(4)].into_iter().collect();
        assert!((jaccard_ids(&a, &b) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn breakdown_components_stay_bounded() {
        let target = room(2_000_000.0, 20.0, Some(10.77), &["wifi", "parking"]);
        let candidate = room(2_100_000.0, 22.0, Some(10.78), &["wifi"]);
        let weights = SimilarityWeights::default();
        let b = similarity_breakdown(&target, &candidate, &weights, &params());

        for component in [b.location, b.price, b.area, b.amenities, b.overall] {
            assert!((0.0..=1.0).contains(&component));
        }
        assert_eq!(b.price, 1.0);
        assert_eq!(b.area, 1.0);
    }

    #[test]
    fn missing_coordinates_zero_the_location_component() {
        let target = room(2_000_000.0, 20.0, Some(10.77), &[]);
        let candidate = room(2_000_000.0, 20.0, None, &[]);
        let b = similarity_breakdown(
            &target,
            &candidate,
            &SimilarityWeights::default(),
            &params(),
        );
        assert_eq!(b.location, 0.0);
        assert_eq!(b.price, 1.0);
    }

    #[test]
    fn shared_amenities_are_sorted_and_deduped() {
        let target = room(1.0, 1.0, None, &["wifi", "parking", "balcony"]);
        let candidate = room(1.0, 1.0, None, &["parking", "wifi", "aircon"]);
        assert_eq!(shared_amenities(&target, &candidate), vec!["parking", "wifi"]);
    }
}

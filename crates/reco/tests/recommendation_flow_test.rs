//! End-to-end engine tests over an in-memory room store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use roomhub_reco::cache::RecommendationCache;
use roomhub_reco::compare::RoomComparator;
use roomhub_reco::config::RecoConfig;
use roomhub_reco::engine::{
    RecommendationRequest, RecommendationService, StaticWeightProvider,
};
use roomhub_reco::repository::RoomStore;
use roomhub_reco::telemetry::PerformanceTracker;
use roomhub_reco::types::{
    Candidate, ClickEvent, Interaction, InteractionKind, InteractionStats, RecommendationMethod,
    Room, SimilarityWeights, UserInteractionProfile,
};
use roomhub_reco::RecoError;

#[derive(Default)]
struct InMemoryRoomStore {
    rooms: Mutex<HashMap<Uuid, Room>>,
    interactions: Mutex<Vec<Interaction>>,
    profiles: Vec<UserInteractionProfile>,
    fail_profile_scan: bool,
    clicks: Mutex<Vec<ClickEvent>>,
}

impl InMemoryRoomStore {
    fn with_rooms(rooms: Vec<Room>) -> Self {
        Self {
            rooms: Mutex::new(rooms.into_iter().map(|r| (r.id, r)).collect()),
            ..Default::default()
        }
    }

    fn add_interaction(&self, user: Uuid, room: Uuid, kind: InteractionKind) {
        self.interactions.lock().unwrap().push(Interaction {
            user_id: user,
            room_id: room,
            kind,
            created_at: Utc::now(),
        });
    }

    fn stats_for(&self, room_id: Uuid) -> InteractionStats {
        let interactions = self.interactions.lock().unwrap();
        let mut stats = InteractionStats::default();
        for interaction in interactions.iter().filter(|i| i.room_id == room_id) {
            match interaction.kind {
                InteractionKind::Favorite => stats.favorites += 1,
                InteractionKind::ViewingRequest => stats.viewings += 1,
                InteractionKind::RentalRequest => stats.requests += 1,
            }
            stats.last_interaction_at = Some(
                stats
                    .last_interaction_at
                    .map_or(interaction.created_at, |at| at.max(interaction.created_at)),
            );
        }
        stats
    }

    fn eligible_candidates(&self, exclude_room: Uuid, caller: Option<Uuid>) -> Vec<Candidate> {
        let engaged: Vec<Uuid> = match caller {
            Some(user) => self
                .interactions
                .lock()
                .unwrap()
                .iter()
                .filter(|i| i.user_id == user)
                .map(|i| i.room_id)
                .collect(),
            None => Vec::new(),
        };

        let rooms = self.rooms.lock().unwrap();
        let mut candidates: Vec<Candidate> = rooms
            .values()
            .filter(|room| room.id != exclude_room && room.is_available)
            .filter(|room| !engaged.contains(&room.id))
            .map(|room| Candidate {
                room: room.clone(),
                stats: self.stats_for(room.id),
            })
            .collect();
        candidates.sort_by(|a, b| b.room.created_at.cmp(&a.room.created_at));
        candidates
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn target_room(&self, room_id: Uuid) -> Result<Option<Room>, sqlx::Error> {
        Ok(self.rooms.lock().unwrap().get(&room_id).cloned())
    }

    async fn candidates(
        &self,
        exclude_room: Uuid,
        fetch_limit: i64,
        caller: Option<Uuid>,
    ) -> Result<Vec<Candidate>, sqlx::Error> {
        let mut candidates = self.eligible_candidates(exclude_room, caller);
        candidates.truncate(fetch_limit as usize);
        Ok(candidates)
    }

    async fn candidates_bulk(
        &self,
        target: &Room,
        fetch_limit: i64,
        caller: Option<Uuid>,
        _max_distance_m: f64,
    ) -> Result<Vec<Candidate>, sqlx::Error> {
        self.candidates(target.id, fetch_limit, caller).await
    }

    async fn user_room_weights(
        &self,
        user_id: Uuid,
    ) -> Result<HashMap<Uuid, f64>, sqlx::Error> {
        let interactions = self.interactions.lock().unwrap();
        let mut weights: HashMap<Uuid, f64> = HashMap::new();
        for interaction in interactions.iter().filter(|i| i.user_id == user_id) {
            let weight = weights.entry(interaction.room_id).or_insert(0.0);
            *weight = weight.max(interaction.kind.weight());
        }
        Ok(weights)
    }

    async fn active_user_profiles(
        &self,
        exclude_user: Option<Uuid>,
        scan_limit: i64,
    ) -> Result<Vec<UserInteractionProfile>, sqlx::Error> {
        if self.fail_profile_scan {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(self
            .profiles
            .iter()
            .filter(|p| Some(p.user_id) != exclude_user)
            .take(scan_limit as usize)
            .cloned()
            .collect())
    }

    async fn record_click(&self, click: &ClickEvent) -> Result<(), sqlx::Error> {
        self.clicks.lock().unwrap().push(click.clone());
        Ok(())
    }

    async fn record_interaction(
        &self,
        user_id: Uuid,
        room_id: Uuid,
        kind: InteractionKind,
    ) -> Result<(), sqlx::Error> {
        self.add_interaction(user_id, room_id, kind);
        Ok(())
    }

    async fn similarity_weight_settings(
        &self,
    ) -> Result<Option<SimilarityWeights>, sqlx::Error> {
        Ok(None)
    }
}

fn room(id: u128, property: u128, price: f64, area: f64, lat: f64) -> Room {
    Room {
        id: Uuid::from_u128(id),
        title: format!("Room {id} with a view of the park"),
        price,
        area_m2: area,
        is_available: true,
        property_id: Uuid::from_u128(property),
        latitude: Some(lat),
        longitude: Some(106.70),
        amenities: vec!["wifi".to_string(), "parking".to_string()],
        image_count: 3,
        created_at: Utc::now() - Duration::days(id as i64),
    }
}

fn seeded_rooms() -> Vec<Room> {
    let mut rooms = vec![room(1, 100, 2_000_000.0, 20.0, 10.7700)];
    for i in 2..=14u128 {
        rooms.push(room(
            i,
            100 + i,
            1_200_000.0 + i as f64 * 450_000.0,
            16.0 + i as f64,
            10.7700 + i as f64 * 0.002,
        ));
    }
    rooms
}

fn build_service(store: Arc<InMemoryRoomStore>) -> RecommendationService {
    let config = Arc::new(RecoConfig::default());
    let cache = Arc::new(RecommendationCache::new(config.cache.clone(), None));
    let tracker = Arc::new(PerformanceTracker::new(config.telemetry.clone()));
    let weights = Arc::new(StaticWeightProvider::new(SimilarityWeights::default()));
    let comparator = RoomComparator::new(None, config.compare_timeout());

    RecommendationService::new(store, cache, tracker, weights, comparator, config)
}

#[tokio::test]
async fn target_room_never_appears_in_results() {
    let store = Arc::new(InMemoryRoomStore::with_rooms(seeded_rooms()));
    let service = build_service(store);

    let request = RecommendationRequest::new(Uuid::from_u128(1));
    let response = service.get_recommendations(&request).await.unwrap();

    assert!(!response.data.is_empty());
    assert!(response
        .data
        .iter()
        .all(|rec| rec.room.id != Uuid::from_u128(1)));
}

#[tokio::test]
async fn scores_and_weights_stay_bounded() {
    let store = Arc::new(InMemoryRoomStore::with_rooms(seeded_rooms()));
    let service = build_service(store);

    let request = RecommendationRequest::new(Uuid::from_u128(1));
    let response = service.get_recommendations(&request).await.unwrap();

    assert!((response.metadata.weights.sum() - 1.0).abs() <= 0.001);
    for (index, rec) in response.data.iter().enumerate() {
        assert!((0.0..=1.0).contains(&rec.similarity_score));
        for component in [
            rec.breakdown.location,
            rec.breakdown.price,
            rec.breakdown.area,
            rec.breakdown.amenities,
            rec.breakdown.overall,
        ] {
            assert!((0.0..=1.0).contains(&component));
        }
        assert_eq!(rec.rank, index + 1);
        assert!(!rec.reasons.is_empty());
    }
}

#[tokio::test]
async fn missing_target_room_is_an_explicit_not_found() {
    let store = Arc::new(InMemoryRoomStore::with_rooms(seeded_rooms()));
    let service = build_service(store);

    let request = RecommendationRequest::new(Uuid::from_u128(999));
    match service.get_recommendations(&request).await {
        Err(RecoError::RoomNotFound(id)) => assert_eq!(id, Uuid::from_u128(999)),
        other => panic!("expected RoomNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_candidate_pool_yields_an_empty_valid_response() {
    let store = Arc::new(InMemoryRoomStore::with_rooms(vec![room(
        1,
        100,
        2_000_000.0,
        20.0,
        10.77,
    )]));
    let service = build_service(store);

    let request = RecommendationRequest::new(Uuid::from_u128(1));
    let response = service.get_recommendations(&request).await.unwrap();
    assert!(response.data.is_empty());
    assert_eq!(response.metadata.candidate_count, 0);
}

#[tokio::test]
async fn thin_caller_history_degrades_collaborative_to_content() {
    let store = Arc::new(InMemoryRoomStore::with_rooms(seeded_rooms()));
    let caller = Uuid::from_u128(500);
    // Two qualifying interactions: below the collaborative minimum of three.
    store.add_interaction(caller, Uuid::from_u128(13), InteractionKind::Favorite);
    store.add_interaction(caller, Uuid::from_u128(14), InteractionKind::ViewingRequest);
    let service = build_service(Arc::clone(&store));

    let mut request = RecommendationRequest::new(Uuid::from_u128(1));
    request.method = RecommendationMethod::Collaborative;
    request.caller_id = Some(caller);

    let response = service.get_recommendations(&request).await.unwrap();
    assert_eq!(
        response.metadata.method_used,
        RecommendationMethod::ContentBased
    );
    assert!(!response.data.is_empty());
}

#[tokio::test]
async fn collaborative_runs_with_enough_history_and_supporters() {
    let mut store = InMemoryRoomStore::with_rooms(seeded_rooms());
    let caller = Uuid::from_u128(500);

    // Caller has engaged with three rooms outside the candidate pool.
    let seed_rooms = [7_001u128, 7_002, 7_003];
    // Two similar users share those rooms and both engaged with room 5.
    store.profiles = vec![
        UserInteractionProfile {
            user_id: Uuid::from_u128(601),
            room_weights: [
                (Uuid::from_u128(7_001), 1.0),
                (Uuid::from_u128(7_002), 1.5),
                (Uuid::from_u128(5), 2.0),
            ]
            .into_iter()
            .collect(),
        },
        UserInteractionProfile {
            user_id: Uuid::from_u128(602),
            room_weights: [
                (Uuid::from_u128(7_002), 1.0),
                (Uuid::from_u128(7_003), 1.0),
                (Uuid::from_u128(5), 1.0),
            ]
            .into_iter()
            .collect(),
        },
    ];
    let store = Arc::new(store);
    for seed in seed_rooms {
        store.add_interaction(caller, Uuid::from_u128(seed), InteractionKind::Favorite);
    }
    let service = build_service(Arc::clone(&store));

    let mut request = RecommendationRequest::new(Uuid::from_u128(1));
    request.method = RecommendationMethod::Collaborative;
    request.caller_id = Some(caller);

    let response = service.get_recommendations(&request).await.unwrap();
    assert_eq!(
        response.metadata.method_used,
        RecommendationMethod::Collaborative
    );
    assert_eq!(response.data.len(), 1);
    assert_eq!(response.data[0].room.id, Uuid::from_u128(5));
}

#[tokio::test]
async fn hybrid_survives_a_failing_collaborative_branch() {
    let mut store = InMemoryRoomStore::with_rooms(seeded_rooms());
    store.fail_profile_scan = true;
    let store = Arc::new(store);
    let caller = Uuid::from_u128(500);
    for seed in [7_001u128, 7_002, 7_003, 7_004] {
        store.add_interaction(caller, Uuid::from_u128(seed), InteractionKind::Favorite);
    }
    let service = build_service(Arc::clone(&store));

    let mut request = RecommendationRequest::new(Uuid::from_u128(1));
    request.caller_id = Some(caller);

    let response = service.get_recommendations(&request).await.unwrap();
    assert_eq!(response.metadata.method_used, RecommendationMethod::Hybrid);
    assert!(!response.data.is_empty());
}

#[tokio::test]
async fn rooms_already_engaged_by_the_caller_are_excluded() {
    let store = Arc::new(InMemoryRoomStore::with_rooms(seeded_rooms()));
    let caller = Uuid::from_u128(500);
    store.add_interaction(caller, Uuid::from_u128(2), InteractionKind::Favorite);
    store.add_interaction(caller, Uuid::from_u128(3), InteractionKind::RentalRequest);
    let service = build_service(Arc::clone(&store));

    let mut request = RecommendationRequest::new(Uuid::from_u128(1));
    request.caller_id = Some(caller);

    let response = service.get_recommendations(&request).await.unwrap();
    for rec in &response.data {
        assert_ne!(rec.room.id, Uuid::from_u128(2));
        assert_ne!(rec.room.id, Uuid::from_u128(3));
    }
}

#[tokio::test]
async fn identical_requests_are_served_from_cache() {
    let store = Arc::new(InMemoryRoomStore::with_rooms(seeded_rooms()));
    let service = build_service(Arc::clone(&store));

    let request = RecommendationRequest::new(Uuid::from_u128(1));
    let first = service.get_recommendations(&request).await.unwrap();
    let second = service.get_recommendations(&request).await.unwrap();

    // The cached payload is returned as stored, execution time included.
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn recording_an_interaction_invalidates_cached_results() {
    let store = Arc::new(InMemoryRoomStore::with_rooms(seeded_rooms()));
    let service = build_service(Arc::clone(&store));

    let request = RecommendationRequest::new(Uuid::from_u128(1));
    let first = service.get_recommendations(&request).await.unwrap();
    let first_count = first.metadata.candidate_count;

    // A new room appears, then an interaction against the target room
    // flushes cached entries that reference it.
    store.rooms.lock().unwrap().insert(
        Uuid::from_u128(50),
        room(50, 150, 2_050_000.0, 21.0, 10.7705),
    );
    service
        .record_interaction(
            Uuid::from_u128(500),
            Uuid::from_u128(1),
            InteractionKind::Favorite,
        )
        .await
        .unwrap();

    let refreshed = service.get_recommendations(&request).await.unwrap();
    assert_eq!(refreshed.metadata.candidate_count, first_count + 1);
}

#[tokio::test]
async fn diversification_limits_tail_duplication() {
    // Ten rooms on one property and one bracket, plus a spread of others.
    let mut rooms = vec![room(1, 100, 2_000_000.0, 20.0, 10.7700)];
    for i in 2..=11u128 {
        rooms.push(room(i, 200, 2_100_000.0, 20.0, 10.7701));
    }
    rooms.push(room(20, 300, 1_500_000.0, 18.0, 10.7702));
    rooms.push(room(21, 301, 4_500_000.0, 30.0, 10.7703));
    rooms.push(room(22, 302, 6_500_000.0, 40.0, 10.7704));

    let store = Arc::new(InMemoryRoomStore::with_rooms(rooms));
    let service = build_service(store);

    let mut request = RecommendationRequest::new(Uuid::from_u128(1));
    request.method = RecommendationMethod::ContentBased;
    let response = service.get_recommendations(&request).await.unwrap();
    assert_eq!(response.data.len(), 8);

    // The tail must bring in properties not already represented.
    let head_properties: Vec<Uuid> = response.data[..6]
        .iter()
        .map(|r| r.room.property_id)
        .collect();
    for rec in &response.data[6..] {
        assert!(!head_properties.contains(&rec.room.property_id));
    }
}

#[tokio::test]
async fn click_tracking_is_best_effort_and_acknowledged() {
    let store = Arc::new(InMemoryRoomStore::with_rooms(seeded_rooms()));
    let service = build_service(Arc::clone(&store));

    service
        .track_click(ClickEvent {
            caller_id: Uuid::from_u128(500),
            source_room_id: Uuid::from_u128(1),
            target_room_id: Uuid::from_u128(2),
            method: RecommendationMethod::Hybrid,
            rank: 1,
            similarity_score: 0.8,
        })
        .await;

    assert_eq!(store.clicks.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn comparison_narrative_falls_back_without_a_generator() {
    let store = Arc::new(InMemoryRoomStore::with_rooms(seeded_rooms()));
    let service = build_service(store);

    let narrative = service
        .compare_rooms(&[Uuid::from_u128(2), Uuid::from_u128(3)])
        .await
        .unwrap();
    assert!(narrative.contains("most affordable"));
}

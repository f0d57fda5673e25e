//! Core read models shared by the recommendation pipeline.
//!
//! Everything here is immutable during a scoring request: rooms and
//! interactions are read-only views produced by the candidate repository,
//! and the scored/ranked types are constructed fresh per request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Tolerance when checking that similarity weights sum to 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.001;

/// Strategy that produced a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationMethod {
    ContentBased,
    Collaborative,
    Popularity,
    LocationBased,
    Hybrid,
}

impl RecommendationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationMethod::ContentBased => "CONTENT_BASED",
            RecommendationMethod::Collaborative => "COLLABORATIVE",
            RecommendationMethod::Popularity => "POPULARITY",
            RecommendationMethod::LocationBased => "LOCATION_BASED",
            RecommendationMethod::Hybrid => "HYBRID",
        }
    }

    /// Parse a method from a query-string value, case-insensitively.
    pub fn from_param(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "CONTENT_BASED" | "CONTENT" => Some(RecommendationMethod::ContentBased),
            "COLLABORATIVE" => Some(RecommendationMethod::Collaborative),
            "POPULARITY" => Some(RecommendationMethod::Popularity),
            "LOCATION_BASED" | "LOCATION" => Some(RecommendationMethod::LocationBased),
            "HYBRID" => Some(RecommendationMethod::Hybrid),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecommendationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rentable room, joined with the owning property's geolocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub title: String,
    /// Monthly price in the platform currency (minor-unit-free).
    pub price: f64,
    pub area_m2: f64,
    pub is_available: bool,
    pub property_id: Uuid,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub amenities: Vec<String>,
    pub image_count: i32,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn amenity_set(&self) -> HashSet<&str> {
        self.amenities.iter().map(|a| a.as_str()).collect()
    }

    /// Fraction of {price, area, coordinates, amenities, images, descriptive
    /// title} that are present, in [0, 1].
    pub fn completeness(&self) -> f64 {
        let mut present = 0u32;
        if self.price > 0.0 {
            present += 1;
        }
        if self.area_m2 > 0.0 {
            present += 1;
        }
        if self.coordinates().is_some() {
            present += 1;
        }
        if !self.amenities.is_empty() {
            present += 1;
        }
        if self.image_count > 0 {
            present += 1;
        }
        if self.title.trim().chars().count() >= 10 {
            present += 1;
        }
        f64::from(present) / 6.0
    }
}

/// Kinds of user-room engagement recorded by the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Favorite,
    ViewingRequest,
    RentalRequest,
}

impl InteractionKind {
    /// Fixed importance weight of the interaction kind.
    pub fn weight(&self) -> f64 {
        match self {
            InteractionKind::Favorite => 1.0,
            InteractionKind::ViewingRequest => 1.5,
            InteractionKind::RentalRequest => 2.0,
        }
    }

    /// Rolling window after which interactions of this kind stop counting.
    pub fn window_days(&self) -> i64 {
        match self {
            InteractionKind::Favorite => 180,
            InteractionKind::ViewingRequest => 120,
            InteractionKind::RentalRequest => 90,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Favorite => "favorite",
            InteractionKind::ViewingRequest => "viewing_request",
            InteractionKind::RentalRequest => "rental_request",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "favorite" => Some(InteractionKind::Favorite),
            "viewing_request" => Some(InteractionKind::ViewingRequest),
            "rental_request" => Some(InteractionKind::RentalRequest),
            _ => None,
        }
    }
}

/// A single user-room engagement event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub kind: InteractionKind,
    pub created_at: DateTime<Utc>,
}

impl Interaction {
    pub fn weight(&self) -> f64 {
        self.kind.weight()
    }
}

/// Windowed interaction counters for one room.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionStats {
    pub favorites: i64,
    pub viewings: i64,
    pub requests: i64,
    pub last_interaction_at: Option<DateTime<Utc>>,
}

impl InteractionStats {
    /// Popularity ranking points: favorites x1, viewings x2, requests x3.
    pub fn popularity_points(&self) -> i64 {
        self.favorites + self.viewings * 2 + self.requests * 3
    }
}

/// A candidate room together with its windowed interaction stats.
///
/// Both repository query paths (simple and bulk) produce this exact shape.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub room: Room,
    pub stats: InteractionStats,
}

/// One user's windowed interaction history, keyed by room with the
/// strongest interaction weight per room.
#[derive(Debug, Clone)]
pub struct UserInteractionProfile {
    pub user_id: Uuid,
    pub room_weights: HashMap<Uuid, f64>,
}

impl UserInteractionProfile {
    pub fn room_set(&self) -> HashSet<Uuid> {
        self.room_weights.keys().copied().collect()
    }
}

/// Component weights for the content similarity score.
///
/// Invariant: non-negative and summing to 1.0 within [`WEIGHT_SUM_TOLERANCE`].
/// Configured values that drift are normalized before use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    pub location: f64,
    pub price: f64,
    pub area: f64,
    pub amenities: f64,
}

impl SimilarityWeights {
    pub fn sum(&self) -> f64 {
        self.location + self.price + self.area + self.amenities
    }

    pub fn is_normalized(&self) -> bool {
        (self.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
            && self.location >= 0.0
            && self.price >= 0.0
            && self.area >= 0.0
            && self.amenities >= 0.0
    }

    /// Return a copy scaled to sum to 1.0. Degenerate inputs (all zero or
    /// negative sum) fall back to the defaults.
    pub fn normalized(&self) -> Self {
        let clamped = Self {
            location: self.location.max(0.0),
            price: self.price.max(0.0),
            area: self.area.max(0.0),
            amenities: self.amenities.max(0.0),
        };
        let sum = clamped.sum();
        if sum <= f64::EPSILON {
            return Self::default();
        }
        Self {
            location: clamped.location / sum,
            price: clamped.price / sum,
            area: clamped.area / sum,
            amenities: clamped.amenities / sum,
        }
    }
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            location: 0.30,
            price: 0.25,
            area: 0.20,
            amenities: 0.25,
        }
    }
}

/// Per-component similarity scores for one (target, candidate) pair.
///
/// All components and the overall score are bounded to [0, 1]. Recomputed
/// per request pair, never persisted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SimilarityBreakdown {
    pub location: f64,
    pub price: f64,
    pub area: f64,
    pub amenities: f64,
    pub overall: f64,
}

/// Price bracket used by the diversification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceBracket {
    Low,
    Medium,
    High,
    Premium,
}

impl PriceBracket {
    pub fn from_price(price: f64) -> Self {
        if price < 2_000_000.0 {
            PriceBracket::Low
        } else if price < 4_000_000.0 {
            PriceBracket::Medium
        } else if price < 6_000_000.0 {
            PriceBracket::High
        } else {
            PriceBracket::Premium
        }
    }
}

/// Snapshot of the target room returned in response metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetRoomSnapshot {
    pub id: Uuid,
    pub title: String,
    pub price: f64,
    pub area_m2: f64,
    pub is_available: bool,
}

impl From<&Room> for TargetRoomSnapshot {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id,
            title: room.title.clone(),
            price: room.price,
            area_m2: room.area_m2,
            is_available: room.is_available,
        }
    }
}

/// A room enriched with its ranking outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedRoom {
    pub room: Room,
    pub similarity_score: f64,
    pub method: RecommendationMethod,
    pub reasons: Vec<String>,
    pub breakdown: SimilarityBreakdown,
    /// 1-based position in the final result list.
    pub rank: usize,
}

/// Metadata attached to every recommendation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationMetadata {
    pub candidate_count: usize,
    pub method_used: RecommendationMethod,
    pub execution_time_ms: u64,
    pub weights: SimilarityWeights,
    pub target: TargetRoomSnapshot,
}

/// The full caller-visible payload; also the unit cached by every tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub data: Vec<RecommendedRoom>,
    pub metadata: RecommendationMetadata,
}

/// A click on a recommended room, reported best-effort by the frontend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickEvent {
    pub caller_id: Uuid,
    pub source_room_id: Uuid,
    pub target_room_id: Uuid,
    pub method: RecommendationMethod,
    pub rank: usize,
    pub similarity_score: f64,
}

//! Candidate repository: the engine's only view of the room/interaction
//! store.
//!
//! Two retrieval paths exist. The simple path pages candidate rooms and
//! then aggregates their interaction stats in a second query. The bulk
//! path folds candidate selection, windowed popularity counts, and cheap
//! location/price pre-scores into a single round trip, so the over-fetch
//! window keeps the most promising rows under high load. Both paths
//! return the same [`Candidate`] shape.
//!
//! Caller exclusion (rooms the user already favorited, requested a viewing
//! for, or applied to rent) happens inside the query, never as a
//! post-filter.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::types::{
    Candidate, ClickEvent, InteractionKind, InteractionStats, Room, SimilarityWeights,
    UserInteractionProfile,
};

/// Query seam between the engine and PostgreSQL. Tests drive the engine
/// through an in-memory implementation.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn target_room(&self, room_id: Uuid) -> Result<Option<Room>, sqlx::Error>;

    /// Available, actively listed candidates excluding the target room and
    /// anything the caller has already engaged with.
    async fn candidates(
        &self,
        exclude_room: Uuid,
        fetch_limit: i64,
        caller: Option<Uuid>,
    ) -> Result<Vec<Candidate>, sqlx::Error>;

    /// Single-round-trip variant: interaction counts and pre-scores are
    /// computed in the database and the result is pre-ordered by a cheap
    /// relevance estimate.
    async fn candidates_bulk(
        &self,
        target: &Room,
        fetch_limit: i64,
        caller: Option<Uuid>,
        max_distance_m: f64,
    ) -> Result<Vec<Candidate>, sqlx::Error>;

    /// The caller's windowed interactions, keyed by room with the
    /// strongest interaction weight per room.
    async fn user_room_weights(
        &self,
        user_id: Uuid,
    ) -> Result<HashMap<Uuid, f64>, sqlx::Error>;

    /// Interaction profiles of the most recently active users, for the
    /// similar-user scan. Bounded by `scan_limit`.
    async fn active_user_profiles(
        &self,
        exclude_user: Option<Uuid>,
        scan_limit: i64,
    ) -> Result<Vec<UserInteractionProfile>, sqlx::Error>;

    async fn record_click(&self, click: &ClickEvent) -> Result<(), sqlx::Error>;

    async fn record_interaction(
        &self,
        user_id: Uuid,
        room_id: Uuid,
        kind: InteractionKind,
    ) -> Result<(), sqlx::Error>;

    /// Runtime-tunable similarity weights, when operators have set them.
    async fn similarity_weight_settings(
        &self,
    ) -> Result<Option<SimilarityWeights>, sqlx::Error>;
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgRoomStore {
    pool: PgPool,
}

impl PgRoomStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn room_from_row(row: &PgRow) -> Result<Room, sqlx::Error> {
        Ok(Room {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            price: row.try_get("price")?,
            area_m2: row.try_get("area_m2")?,
            is_available: row.try_get("is_available")?,
            property_id: row.try_get("property_id")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            amenities: row
                .try_get::<Option<Vec<String>>, _>("amenities")?
                .unwrap_or_default(),
            image_count: row.try_get("image_count")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn window_cutoffs() -> (
        chrono::DateTime<Utc>,
        chrono::DateTime<Utc>,
        chrono::DateTime<Utc>,
    ) {
        let now = Utc::now();
        (
            now - Duration::days(InteractionKind::Favorite.window_days()),
            now - Duration::days(InteractionKind::ViewingRequest.window_days()),
            now - Duration::days(InteractionKind::RentalRequest.window_days()),
        )
    }
}

#[async_trait]
impl RoomStore for PgRoomStore {
    async fn target_room(&self, room_id: Uuid) -> Result<Option<Room>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT r.id, r.title, r.price, r.area_m2, r.is_available,
                   r.property_id, r.image_count, r.amenities, r.created_at,
                   p.latitude, p.longitude
            FROM rooms r
            JOIN properties p ON p.id = r.property_id
            WHERE r.id = $1
            "#,
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::room_from_row).transpose()
    }

    async fn candidates(
        &self,
        exclude_room: Uuid,
        fetch_limit: i64,
        caller: Option<Uuid>,
    ) -> Result<Vec<Candidate>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.title, r.price, r.area_m2, r.is_available,
                   r.property_id, r.image_count, r.amenities, r.created_at,
                   p.latitude, p.longitude
            FROM rooms r
            JOIN properties p ON p.id = r.property_id
            WHERE r.id <> $1
              AND r.is_available
              AND EXISTS (
                  SELECT 1 FROM listings l
                  WHERE l.room_id = r.id
                    AND l.status = 'active'
                    AND (l.expires_at IS NULL OR l.expires_at > NOW())
              )
              AND ($2::uuid IS NULL OR NOT EXISTS (
                  SELECT 1 FROM interactions ix
                  WHERE ix.user_id = $2 AND ix.room_id = r.id
              ))
            ORDER BY r.created_at DESC
            LIMIT $3
            "#,
        )
        .bind(exclude_room)
        .bind(caller)
        .bind(fetch_limit)
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            candidates.push(Candidate {
                room: Self::room_from_row(row)?,
                stats: InteractionStats::default(),
            });
        }
        if candidates.is_empty() {
            return Ok(candidates);
        }

        // Second round trip: windowed interaction counters for the page.
        let ids: Vec<Uuid> = candidates.iter().map(|c| c.room.id).collect();
        let (fav_cutoff, view_cutoff, req_cutoff) = Self::window_cutoffs();
        let stat_rows = sqlx::query(
            r#"
            SELECT room_id,
                   COUNT(*) FILTER (WHERE kind = 'favorite' AND created_at >= $2) AS favorites,
                   COUNT(*) FILTER (WHERE kind = 'viewing_request' AND created_at >= $3) AS viewings,
                   COUNT(*) FILTER (WHERE kind = 'rental_request' AND created_at >= $4) AS requests,
                   MAX(created_at) AS last_interaction_at
            FROM interactions
            WHERE room_id = ANY($1)
            GROUP BY room_id
            "#,
        )
        .bind(&ids)
        .bind(fav_cutoff)
        .bind(view_cutoff)
        .bind(req_cutoff)
        .fetch_all(&self.pool)
        .await?;

        let mut stats_by_room: HashMap<Uuid, InteractionStats> = HashMap::new();
        for row in stat_rows {
            stats_by_room.insert(
                row.try_get("room_id")?,
                InteractionStats {
                    favorites: row.try_get("favorites")?,
                    viewings: row.try_get("viewings")?,
                    requests: row.try_get("requests")?,
                    last_interaction_at: row.try_get("last_interaction_at")?,
                },
            );
        }
        for candidate in &mut candidates {
            if let Some(stats) = stats_by_room.remove(&candidate.room.id) {
                candidate.stats = stats;
            }
        }

        Ok(candidates)
    }

    async fn candidates_bulk(
        &self,
        target: &Room,
        fetch_limit: i64,
        caller: Option<Uuid>,
        max_distance_m: f64,
    ) -> Result<Vec<Candidate>, sqlx::Error> {
        let (fav_cutoff, view_cutoff, req_cutoff) = Self::window_cutoffs();
        // The ORDER BY estimates relevance without a per-row haversine:
        // degree deltas scaled to meters for location, relative difference
        // for price, and capped weighted interaction points for
        // popularity. The real scoring pass recomputes everything exactly.
        let rows = sqlx::query(
            r#"
            WITH stats AS (
                SELECT room_id,
                       COUNT(*) FILTER (WHERE kind = 'favorite' AND created_at >= $4) AS favorites,
                       COUNT(*) FILTER (WHERE kind = 'viewing_request' AND created_at >= $5) AS viewings,
                       COUNT(*) FILTER (WHERE kind = 'rental_request' AND created_at >= $6) AS requests,
                       MAX(created_at) AS last_interaction_at
                FROM interactions
                GROUP BY room_id
            )
            SELECT r.id, r.title, r.price, r.area_m2, r.is_available,
                   r.property_id, r.image_count, r.amenities, r.created_at,
                   p.latitude, p.longitude,
                   COALESCE(s.favorites, 0) AS favorites,
                   COALESCE(s.viewings, 0) AS viewings,
                   COALESCE(s.requests, 0) AS requests,
                   s.last_interaction_at
            FROM rooms r
            JOIN properties p ON p.id = r.property_id
            LEFT JOIN stats s ON s.room_id = r.id
            WHERE r.id <> $1
              AND r.is_available
              AND EXISTS (
                  SELECT 1 FROM listings l
                  WHERE l.room_id = r.id
                    AND l.status = 'active'
                    AND (l.expires_at IS NULL OR l.expires_at > NOW())
              )
              AND ($2::uuid IS NULL OR NOT EXISTS (
                  SELECT 1 FROM interactions ix
                  WHERE ix.user_id = $2 AND ix.room_id = r.id
              ))
            ORDER BY
                (CASE WHEN p.latitude IS NOT NULL AND $7::float8 IS NOT NULL
                      THEN GREATEST(0.0, 1.0 - (ABS(p.latitude - $7) + ABS(p.longitude - $8)) * 111000.0 / $9)
                      ELSE 0.0 END) * 0.4
                + GREATEST(0.0, 1.0 - ABS(r.price - $10) / NULLIF((r.price + $10) / 2.0, 0.0)) * 0.3
                + LEAST(1.0,
                    (COALESCE(s.favorites, 0) + 2 * COALESCE(s.viewings, 0) + 3 * COALESCE(s.requests, 0)) / 20.0
                  ) * 0.3
                DESC,
                r.created_at DESC
            LIMIT $3
            "#,
        )
        .bind(target.id)
        .bind(caller)
        .bind(fetch_limit)
        .bind(fav_cutoff)
        .bind(view_cutoff)
        .bind(req_cutoff)
        .bind(target.latitude)
        .bind(target.longitude)
        .bind(max_distance_m)
        .bind(target.price)
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            candidates.push(Candidate {
                room: Self::room_from_row(row)?,
                stats: InteractionStats {
                    favorites: row.try_get("favorites")?,
                    viewings: row.try_get("viewings")?,
                    requests: row.try_get("requests")?,
                    last_interaction_at: row.try_get("last_interaction_at")?,
                },
            });
        }

        Ok(candidates)
    }

    async fn user_room_weights(
        &self,
        user_id: Uuid,
    ) -> Result<HashMap<Uuid, f64>, sqlx::Error> {
        let (fav_cutoff, view_cutoff, req_cutoff) = Self::window_cutoffs();
        let rows = sqlx::query(
            r#"
            SELECT room_id,
                   MAX(CASE kind
                       WHEN 'favorite' THEN 1.0
                       WHEN 'viewing_request' THEN 1.5
                       WHEN 'rental_request' THEN 2.0
                       ELSE 0.0
                   END)::float8 AS weight
            FROM interactions
            WHERE user_id = $1
              AND ((kind = 'favorite' AND created_at >= $2)
                OR (kind = 'viewing_request' AND created_at >= $3)
                OR (kind = 'rental_request' AND created_at >= $4))
            GROUP BY room_id
            "#,
        )
        .bind(user_id)
        .bind(fav_cutoff)
        .bind(view_cutoff)
        .bind(req_cutoff)
        .fetch_all(&self.pool)
        .await?;

        let mut weights = HashMap::with_capacity(rows.len());
        for row in rows {
            weights.insert(row.try_get("room_id")?, row.try_get("weight")?);
        }
        Ok(weights)
    }

    async fn active_user_profiles(
        &self,
        exclude_user: Option<Uuid>,
        scan_limit: i64,
    ) -> Result<Vec<UserInteractionProfile>, sqlx::Error> {
        let (fav_cutoff, view_cutoff, req_cutoff) = Self::window_cutoffs();
        let rows = sqlx::query(
            r#"
            WITH active AS (
                SELECT user_id, MAX(created_at) AS last_at
                FROM interactions
                WHERE $1::uuid IS NULL OR user_id <> $1
                GROUP BY user_id
                ORDER BY last_at DESC
                LIMIT $2
            )
            SELECT i.user_id, i.room_id,
                   MAX(CASE i.kind
                       WHEN 'favorite' THEN 1.0
                       WHEN 'viewing_request' THEN 1.5
                       WHEN 'rental_request' THEN 2.0
                       ELSE 0.0
                   END)::float8 AS weight
            FROM interactions i
            JOIN active a ON a.user_id = i.user_id
            WHERE ((i.kind = 'favorite' AND i.created_at >= $3)
                OR (i.kind = 'viewing_request' AND i.created_at >= $4)
                OR (i.kind = 'rental_request' AND i.created_at >= $5))
            GROUP BY i.user_id, i.room_id
            "#,
        )
        .bind(exclude_user)
        .bind(scan_limit)
        .bind(fav_cutoff)
        .bind(view_cutoff)
        .bind(req_cutoff)
        .fetch_all(&self.pool)
        .await?;

        let mut by_user: HashMap<Uuid, HashMap<Uuid, f64>> = HashMap::new();
        for row in rows {
            let user_id: Uuid = row.try_get("user_id")?;
            let room_id: Uuid = row.try_get("room_id")?;
            let weight: f64 = row.try_get("weight")?;
            by_user.entry(user_id).or_default().insert(room_id, weight);
        }

        Ok(by_user
            .into_iter()
            .map(|(user_id, room_weights)| UserInteractionProfile {
                user_id,
                room_weights,
            })
            .collect())
    }

    async fn record_click(&self, click: &ClickEvent) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO recommendation_clicks
                (id, user_id, source_room_id, target_room_id, method, rank, similarity_score, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(click.caller_id)
        .bind(click.source_room_id)
        .bind(click.target_room_id)
        .bind(click.method.as_str())
        .bind(click.rank as i32)
        .bind(click.similarity_score)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_interaction(
        &self,
        user_id: Uuid,
        room_id: Uuid,
        kind: InteractionKind,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO interactions (id, user_id, room_id, kind, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(room_id)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn similarity_weight_settings(
        &self,
    ) -> Result<Option<SimilarityWeights>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT value FROM system_settings WHERE key = 'similarity_weights'
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("value")?;

        // A malformed setting row must not take recommendations down; it
        // just falls back to configured weights.
        match serde_json::from_str::<SimilarityWeights>(&raw) {
            Ok(weights) => Ok(Some(weights)),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed similarity_weights setting");
                Ok(None)
            }
        }
    }
}

//! HTTP request/response adapters. All recommendation logic lives in the
//! service facade; handlers only parse parameters and map errors.

use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::RecommendationRequest;
use crate::error::RecoError;
use crate::types::{ClickEvent, InteractionKind, RecommendationMethod};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct RecommendationsQuery {
    pub limit: Option<usize>,
    pub method: Option<String>,
    pub user_id: Option<Uuid>,
    pub max_distance: Option<f64>,
    pub price_variance: Option<f64>,
    pub area_variance: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct InteractionRequest {
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub kind: InteractionKind,
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub room_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct PerformanceQuery {
    pub days: Option<i64>,
}

fn error_response(error: &RecoError) -> HttpResponse {
    let body = serde_json::json!({ "error": error.to_string() });
    match error {
        RecoError::RoomNotFound(_) => HttpResponse::NotFound().json(body),
        RecoError::Storage(_) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "failed to retrieve recommendations"
        })),
    }
}

/// `GET /api/v1/rooms/{id}/recommendations`
pub async fn get_recommendations(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<RecommendationsQuery>,
) -> impl Responder {
    let method = match query.method.as_deref() {
        Some(raw) => match RecommendationMethod::from_param(raw) {
            Some(method) => method,
            None => {
                return HttpResponse::BadRequest().json(serde_json::json!({
                    "error": format!("unknown recommendation method: {raw}")
                }));
            }
        },
        None => RecommendationMethod::Hybrid,
    };

    let mut request = RecommendationRequest::new(path.into_inner());
    request.method = method;
    if let Some(limit) = query.limit {
        request.limit = limit;
    }
    request.caller_id = query.user_id;
    request.max_distance_m = query.max_distance;
    request.price_variance = query.price_variance;
    request.area_variance = query.area_variance;

    match state.service.get_recommendations(&request).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => error_response(&e),
    }
}

/// `POST /api/v1/recommendations/click`. Always acknowledged.
pub async fn track_click(
    state: web::Data<AppState>,
    body: web::Json<ClickEvent>,
) -> impl Responder {
    state.service.track_click(body.into_inner()).await;
    HttpResponse::Accepted().json(serde_json::json!({ "status": "accepted" }))
}

/// `POST /api/v1/interactions`. Records the interaction and invalidates
/// cached recommendations touching the room and the user.
pub async fn record_interaction(
    state: web::Data<AppState>,
    body: web::Json<InteractionRequest>,
) -> impl Responder {
    let request = body.into_inner();
    match state
        .service
        .record_interaction(request.user_id, request.room_id, request.kind)
        .await
    {
        Ok(()) => HttpResponse::Created().json(serde_json::json!({ "status": "recorded" })),
        Err(e) => error_response(&e),
    }
}

/// `POST /api/v1/rooms/compare`
pub async fn compare_rooms(
    state: web::Data<AppState>,
    body: web::Json<CompareRequest>,
) -> impl Responder {
    match state.service.compare_rooms(&body.room_ids).await {
        Ok(narrative) => HttpResponse::Ok().json(serde_json::json!({ "narrative": narrative })),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/v1/recommendations/cache/stats`
pub async fn cache_stats(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.service.cache_stats().await)
}

/// `GET /api/v1/recommendations/performance`
pub async fn performance_stats(
    state: web::Data<AppState>,
    query: web::Query<PerformanceQuery>,
) -> impl Responder {
    let days = query.days.unwrap_or(7);
    HttpResponse::Ok().json(state.service.performance_stats(days))
}

/// `GET /health`. The classification drives the status code so load
/// balancers can act on it.
pub async fn health(state: web::Data<AppState>) -> impl Responder {
    let report = state.service.health();
    let status = actix_web::http::StatusCode::from_u16(report.status.http_status_code())
        .unwrap_or(actix_web::http::StatusCode::OK);
    HttpResponse::build(status).json(report)
}

pub async fn readiness() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ready" }))
}

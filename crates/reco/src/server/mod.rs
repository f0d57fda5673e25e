pub mod handlers;

use std::sync::Arc;

use actix_web::web;

use crate::engine::RecommendationService;

/// Application state shared across all handlers
pub struct AppState {
    pub service: Arc<RecommendationService>,
}

/// Configure application routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route(
                "/rooms/{id}/recommendations",
                web::get().to(handlers::get_recommendations),
            )
            .route("/rooms/compare", web::post().to(handlers::compare_rooms))
            .route(
                "/recommendations/click",
                web::post().to(handlers::track_click),
            )
            .route(
                "/recommendations/cache/stats",
                web::get().to(handlers::cache_stats),
            )
            .route(
                "/recommendations/performance",
                web::get().to(handlers::performance_stats),
            )
            .route("/interactions", web::post().to(handlers::record_interaction)),
    )
    .route("/health", web::get().to(handlers::health))
    .route("/ready", web::get().to(handlers::readiness));
}

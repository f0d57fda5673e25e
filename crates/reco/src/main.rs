//! Recommendation Service - Room Similarity and Discovery
//!
//! Port: 8083
//! Latency target: <200ms recommendations (cache misses), <10ms cache hits

use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing::{info, warn};

use roomhub_reco::cache::{DistributedTier, RecommendationCache};
use roomhub_reco::compare::{HttpTextGenerator, RoomComparator, TextGenerator};
use roomhub_reco::config::RecoConfig;
use roomhub_reco::engine::{DbWeightProvider, RecommendationService};
use roomhub_reco::repository::PgRoomStore;
use roomhub_reco::server::{configure_routes, AppState};
use roomhub_reco::telemetry::PerformanceTracker;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .json()
        .init();

    let config = Arc::new(RecoConfig::load()?);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting Recommendation Service on {}", bind_addr);

    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(
            config.database.connect_timeout_sec,
        ))
        .connect(&config.database.url)
        .await?;

    let store: Arc<dyn roomhub_reco::repository::RoomStore> =
        Arc::new(PgRoomStore::new(db_pool));

    // The distributed tier is optional: without it the engine still runs
    // on its in-process tiers alone.
    let distributed = match &config.cache.redis_url {
        Some(url) => match DistributedTier::connect(url).await {
            Ok(tier) => Some(tier),
            Err(e) => {
                warn!(error = %e, "Distributed cache unavailable, running in-process tiers only");
                None
            }
        },
        None => None,
    };
    let cache = Arc::new(RecommendationCache::new(config.cache.clone(), distributed));

    let tracker = Arc::new(PerformanceTracker::new(config.telemetry.clone()));
    PerformanceTracker::spawn_maintenance(Arc::clone(&tracker));

    let generator: Option<Arc<dyn TextGenerator>> = if config.compare.api_key.is_some() {
        match HttpTextGenerator::new(config.compare.clone()) {
            Ok(generator) => Some(Arc::new(generator)),
            Err(e) => {
                warn!(error = %e, "Text generation client unavailable, comparisons fall back to summaries");
                None
            }
        }
    } else {
        None
    };
    let comparator = RoomComparator::new(generator, config.compare_timeout());

    let weights = Arc::new(DbWeightProvider::new(store.clone(), config.scoring.weights));

    let service = Arc::new(RecommendationService::new(
        store,
        cache,
        tracker,
        weights,
        comparator,
        Arc::clone(&config),
    ));

    let app_state = web::Data::new(AppState { service });
    let workers = config.server.workers.unwrap_or_else(num_cpus::get);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(configure_routes)
            .wrap(actix_web::middleware::Logger::default())
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}

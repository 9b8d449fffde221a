use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    db::{Cache, ViewStore},
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
    services::{ClusterAssigner, RecommendationService},
};

pub mod log_views;
pub mod recommendations;

/// Shared handler state
pub struct AppState {
    pub recommender: Arc<RecommendationService>,
    pub assigner: Arc<ClusterAssigner>,
    pub views: Arc<dyn ViewStore>,
    /// Recommendation cache, absent when Redis is not configured
    pub cache: Option<Cache>,
    pub cache_ttl_secs: u64,
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/log-views", post(log_views::record))
        .route("/log-views/applier/:applier_id", get(log_views::by_applier))
        .route("/log-views/job/:job_id", get(log_views::by_job))
        .route(
            "/recommendations/cluster/dbscan",
            post(recommendations::refresh_density_based),
        )
        .route(
            "/recommendations/cluster/kmeans",
            post(recommendations::refresh_partitional),
        )
        .route("/recommendations/:applier_id", get(recommendations::recommend))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

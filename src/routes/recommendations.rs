use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    cached,
    db::CacheKey,
    error::AppResult,
    middleware::request_id::RequestId,
    models::{ApplierId, DensityParams, JobId, PartitionParams, RecommendationQuery},
    routes::AppState,
};

/// Handler for recommendation endpoint
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(applier_id): Path<ApplierId>,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Json<Vec<JobId>>> {
    query.validate()?;

    tracing::info!(
        request_id = %request_id,
        applier_id = %applier_id,
        limit = query.limit,
        decay_factor = query.decay_factor,
        "Processing recommendation request"
    );

    let compute = state
        .recommender
        .recommend(applier_id, query.limit, query.decay_factor);

    let job_ids: Vec<JobId> = match &state.cache {
        Some(cache) if state.cache_ttl_secs > 0 => {
            let key = CacheKey::Recommendations {
                applier_id,
                limit: query.limit,
                decay_factor: query.decay_factor,
            };
            cached!(cache, key, state.cache_ttl_secs, compute)
        }
        _ => compute.await,
    };

    Ok(Json(job_ids))
}

/// Handler for the density-based cluster refresh
pub async fn refresh_density_based(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<DensityParams>,
) -> AppResult<Json<bool>> {
    params.validate()?;

    tracing::info!(
        request_id = %request_id,
        epsilon = params.epsilon,
        min_samples = params.min_samples,
        "Processing density-based cluster refresh"
    );

    let refreshed = state
        .assigner
        .assign_density_based(params.epsilon, params.min_samples)
        .await;

    Ok(Json(refreshed))
}

/// Handler for the k-means cluster refresh
pub async fn refresh_partitional(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<PartitionParams>,
) -> AppResult<Json<bool>> {
    params.validate()?;

    tracing::info!(
        request_id = %request_id,
        n_clusters = params.n_clusters,
        "Processing k-means cluster refresh"
    );

    let refreshed = state.assigner.assign_partitional(params.n_clusters).await;

    Ok(Json(refreshed))
}

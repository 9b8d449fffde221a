use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    models::{ApplierId, JobId, NewViewEvent, ViewEvent, ViewLogQuery},
    routes::AppState,
};

/// Records one job view
pub async fn record(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(event): Json<NewViewEvent>,
) -> AppResult<(StatusCode, Json<ViewEvent>)> {
    let event = state.views.record_view(event).await?;

    tracing::info!(
        request_id = %request_id,
        applier_id = %event.applier_id,
        job_id = %event.job_id,
        "View logged"
    );

    Ok((StatusCode::CREATED, Json(event)))
}

/// Most recent views by one applier
pub async fn by_applier(
    State(state): State<Arc<AppState>>,
    Path(applier_id): Path<ApplierId>,
    Query(query): Query<ViewLogQuery>,
) -> AppResult<Json<Vec<ViewEvent>>> {
    query.validate()?;
    let views = state.views.views_by_applier(applier_id, query.limit).await?;
    Ok(Json(views))
}

/// Most recent views of one job
pub async fn by_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<JobId>,
    Query(query): Query<ViewLogQuery>,
) -> AppResult<Json<Vec<ViewEvent>>> {
    query.validate()?;
    let views = state.views.views_by_job(job_id, query.limit).await?;
    Ok(Json(views))
}

//! Handlers for the `/access-controls` resource (append-only).

use accessgate_db::models::access_control::AccessControlListQuery;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::engine::recorder::RecordAccess;
use crate::error::AppResult;
use crate::middleware::tenant::RequestContext;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/access-controls
pub async fn record_access(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(input): Json<RecordAccess>,
) -> AppResult<impl IntoResponse> {
    let record = state
        .engine
        .recorder
        .record(ctx.tenant_id, ctx.actor_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: record })))
}

/// GET /api/v1/access-controls
pub async fn list_access_controls(
    ctx: RequestContext,
    State(state): State<AppState>,
    Query(params): Query<AccessControlListQuery>,
) -> AppResult<impl IntoResponse> {
    let records = state.engine.recorder.list(ctx.tenant_id, &params).await?;
    Ok(Json(DataResponse { data: records }))
}

//! Handlers for the `/access-releases` resource.

use accessgate_core::types::DbId;
use accessgate_db::models::access_release::ReleaseListQuery;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::engine::release::{AcceptInvitation, CreateAccessRelease};
use crate::error::AppResult;
use crate::middleware::tenant::RequestContext;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/access-releases
///
/// Returns 201 with the release, already `active` when its window has
/// started.
pub async fn create_release(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(input): Json<CreateAccessRelease>,
) -> AppResult<impl IntoResponse> {
    let release = state
        .engine
        .releases
        .create(ctx.tenant_id, ctx.actor_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: release })))
}

/// POST /api/v1/access-releases/invitations
pub async fn accept_invitation(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(input): Json<AcceptInvitation>,
) -> AppResult<impl IntoResponse> {
    let release = state
        .engine
        .releases
        .create_from_invitation(ctx.tenant_id, ctx.actor_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: release })))
}

/// GET /api/v1/access-releases
pub async fn list_releases(
    ctx: RequestContext,
    State(state): State<AppState>,
    Query(params): Query<ReleaseListQuery>,
) -> AppResult<impl IntoResponse> {
    let releases = state.engine.releases.list(ctx.tenant_id, &params).await?;
    Ok(Json(DataResponse { data: releases }))
}

/// GET /api/v1/access-releases/{id}
pub async fn get_release(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let release = state.engine.releases.get(id, ctx.tenant_id).await?;
    Ok(Json(DataResponse { data: release }))
}

/// POST /api/v1/access-releases/{id}/disable
///
/// Idempotent for already-disabled releases; 409 for deleted or ended
/// ones; 502 when equipment revocation fails.
pub async fn disable_release(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let release = state
        .engine
        .releases
        .disable(id, ctx.tenant_id, ctx.actor_id)
        .await?;
    Ok(Json(DataResponse { data: release }))
}

/// DELETE /api/v1/access-releases/{id}
pub async fn delete_release(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    state
        .engine
        .releases
        .delete(id, ctx.tenant_id, ctx.actor_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

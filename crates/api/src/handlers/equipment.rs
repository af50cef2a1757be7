//! Equipment onboarding and person-type resync.
//!
//! Both sync endpoints answer 202 with the created job records; progress
//! is observed through `/sync-jobs`.

use accessgate_core::types::DbId;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::tenant::RequestContext;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyEquipment {
    #[validate(length(min = 1, max = 255))]
    pub ip: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResult {
    pub ip: String,
    pub reachable: bool,
}

/// Body of `POST /equipment/{id}/sync`.
#[derive(Debug, Default, Deserialize)]
pub struct SyncEquipmentRequest {
    /// Person types whose active releases should be pushed.
    #[serde(default)]
    pub person_type_ids: Vec<DbId>,
}

/// POST /api/v1/equipment/verify
pub async fn verify_equipment(
    _ctx: RequestContext,
    State(state): State<AppState>,
    Json(input): Json<VerifyEquipment>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(accessgate_core::error::CoreError::from)?;
    state.engine.sync.verify_equipment(&input.ip).await?;
    Ok(Json(DataResponse {
        data: VerifyResult {
            ip: input.ip,
            reachable: true,
        },
    }))
}

/// POST /api/v1/equipment/{id}/sync
pub async fn sync_equipment(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(equipment_id): Path<DbId>,
    Json(input): Json<SyncEquipmentRequest>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .engine
        .sync
        .sync_equipment(equipment_id, &input.person_type_ids, ctx.tenant_id)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: job })))
}

/// POST /api/v1/person-types/{id}/sync
pub async fn sync_person_type(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(person_type_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let jobs = state
        .engine
        .sync
        .sync_person_type(person_type_id, ctx.tenant_id)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: jobs })))
}

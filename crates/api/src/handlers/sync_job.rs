use accessgate_core::types::DbId;
use accessgate_db::models::sync_job::{SyncJob, SyncJobListQuery};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::tenant::RequestContext;
use crate::response::DataResponse;
use crate::state::AppState;

/// Job record plus derived completion percentage.
#[derive(Debug, Serialize)]
pub struct SyncJobView {
    #[serde(flatten)]
    pub job: SyncJob,
    pub progress_percent: i16,
}

impl From<SyncJob> for SyncJobView {
    fn from(job: SyncJob) -> Self {
        Self {
            progress_percent: job.progress_percent(),
            job,
        }
    }
}

/// GET /api/v1/sync-jobs
pub async fn list_jobs(
    ctx: RequestContext,
    State(state): State<AppState>,
    Query(params): Query<SyncJobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs: Vec<SyncJobView> = state
        .engine
        .sync
        .list_jobs(ctx.tenant_id, &params)
        .await?
        .into_iter()
        .map(SyncJobView::from)
        .collect();
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/sync-jobs/{id}
pub async fn get_job(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state.engine.sync.get_job(id, ctx.tenant_id).await?;
    Ok(Json(DataResponse {
        data: SyncJobView::from(job),
    }))
}

use axum::routing::get;
use axum::Router;

use crate::handlers::sync_job;
use crate::state::AppState;

/// Routes mounted at `/sync-jobs`. Read-only: jobs are created by sync
/// requests and mutated only by the worker.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(sync_job::list_jobs))
        .route("/{id}", get(sync_job::get_job))
}

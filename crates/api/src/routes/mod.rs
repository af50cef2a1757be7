pub mod access_control;
pub mod access_release;
pub mod equipment;
pub mod health;
pub mod sync_job;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Every route requires the `X-Tenant-Id` header; `X-Actor-Id` is recorded
/// in audit actions when present.
///
/// ```text
/// /access-releases                       list, create
/// /access-releases/invitations           create from invitation (POST)
/// /access-releases/{id}                  get, delete
/// /access-releases/{id}/disable          disable (POST)
///
/// /access-controls                       list, record entry/exit
///
/// /sync-jobs                             list
/// /sync-jobs/{id}                        get
///
/// /equipment/verify                      reachability check (POST)
/// /equipment/{id}/sync                   onboarding sync (POST, 202)
/// /person-types/{id}/sync                person-type resync (POST, 202)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/access-releases", access_release::router())
        .nest("/access-controls", access_control::router())
        .nest("/sync-jobs", sync_job::router())
        .merge(equipment::router())
}

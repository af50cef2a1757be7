use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Liveness payload. `status` drops to `degraded` when Postgres is
/// unreachable; the scheduler counters are informational.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    pub pending_timers: usize,
    pub sync_in_flight: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = accessgate_db::health_check(&state.pool).await.is_ok();

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        pending_timers: state.engine.timers.pending_count(),
        sync_in_flight: state.engine.sync.in_flight(),
    })
}

/// `GET /health`, mounted at the root rather than under `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

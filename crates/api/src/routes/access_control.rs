use axum::routing::get;
use axum::Router;

use crate::handlers::access_control;
use crate::state::AppState;

/// Routes mounted at `/access-controls`.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/",
        get(access_control::list_access_controls).post(access_control::record_access),
    )
}

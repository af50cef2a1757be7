use axum::routing::{get, post};
use axum::Router;

use crate::handlers::access_release;
use crate::state::AppState;

/// Routes mounted at `/access-releases`.
///
/// ```text
/// GET    /                -> list_releases
/// POST   /                -> create_release
/// POST   /invitations     -> accept_invitation
/// GET    /{id}            -> get_release
/// DELETE /{id}            -> delete_release
/// POST   /{id}/disable    -> disable_release
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(access_release::list_releases).post(access_release::create_release),
        )
        .route("/invitations", post(access_release::accept_invitation))
        .route(
            "/{id}",
            get(access_release::get_release).delete(access_release::delete_release),
        )
        .route("/{id}/disable", post(access_release::disable_release))
}

use axum::routing::post;
use axum::Router;

use crate::handlers::equipment;
use crate::state::AppState;

/// ```text
/// POST   /equipment/verify          -> verify_equipment
/// POST   /equipment/{id}/sync       -> sync_equipment
/// POST   /person-types/{id}/sync    -> sync_person_type
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/equipment/verify", post(equipment::verify_equipment))
        .route("/equipment/{id}/sync", post(equipment::sync_equipment))
        .route("/person-types/{id}/sync", post(equipment::sync_person_type))
}

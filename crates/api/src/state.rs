use std::sync::Arc;

use crate::config::ServerConfig;
use crate::engine::Engine;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is an `Arc` or a handle over one.
#[derive(Clone)]
pub struct AppState {
    pub pool: accessgate_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Release lifecycle, equipment sync, and access recording services.
    pub engine: Engine,
}

//! Tenant and actor extraction for Axum handlers.
//!
//! Authentication and tenant routing happen upstream; this service trusts
//! the gateway to forward the resolved identifiers as headers.

use accessgate_core::error::CoreError;
use accessgate_core::types::DbId;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Caller identity for one request.
///
/// ```ignore
/// async fn my_handler(ctx: RequestContext) -> AppResult<Json<()>> {
///     tracing::info!(tenant_id = ctx.tenant_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    pub tenant_id: DbId,
    /// Person acting on the request, recorded in audit actions.
    pub actor_id: Option<DbId>,
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = header_id(parts, TENANT_HEADER)?.ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Missing X-Tenant-Id header".into(),
            ))
        })?;
        let actor_id = header_id(parts, ACTOR_HEADER)?;

        Ok(RequestContext {
            tenant_id,
            actor_id,
        })
    }
}

fn header_id(parts: &Parts, name: &'static str) -> Result<Option<DbId>, AppError> {
    let Some(value) = parts.headers.get(name) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<DbId>().ok())
        .filter(|id| *id > 0)
        .map(Some)
        .ok_or_else(|| AppError::BadRequest(format!("Header {name} must be a positive integer")))
}

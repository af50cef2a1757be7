//! Success envelope shared by every `/api/v1` handler.

use serde::Serialize;

/// `{ "data": T }`. Errors use the `{ "error", "code" }` shape from
/// [`AppError`](crate::error::AppError) instead.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

use accessgate_core::error::CoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Errors surfaced by handlers and the lifecycle engine.
///
/// Domain failures arrive as [`CoreError`]; the remaining variants cover
/// storage and request-shape problems. Every variant renders as
/// `{"error": <message>, "code": <ErrorCode>}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// Machine-readable value of the `code` field in error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    ValidationError,
    BadRequest,
    Conflict,
    Unauthorized,
    EquipmentError,
    InternalError,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError | ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::EquipmentError => StatusCode::BAD_GATEWAY,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: ErrorCode,
}

const SANITIZED: &str = "An internal error occurred";

/// Postgres SQLSTATE for unique violations.
const UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE for check constraint violations.
const CHECK_VIOLATION: &str = "23514";

impl AppError {
    /// The code and client-facing message for this error. Internal details
    /// are logged here and replaced with a generic message.
    pub fn classify(&self) -> (ErrorCode, String) {
        match self {
            AppError::Core(CoreError::NotFound { entity, id }) => {
                (ErrorCode::NotFound, format!("{entity} with id {id} not found"))
            }
            AppError::Core(CoreError::Validation(msg)) => (ErrorCode::ValidationError, msg.clone()),
            AppError::Core(CoreError::Conflict(msg)) => (ErrorCode::Conflict, msg.clone()),
            AppError::Core(CoreError::Unauthorized(msg)) => (ErrorCode::Unauthorized, msg.clone()),
            AppError::Core(CoreError::Equipment(msg)) => {
                tracing::warn!(error = %msg, "Equipment failure on request path");
                (ErrorCode::EquipmentError, msg.clone())
            }
            AppError::Core(CoreError::Internal(msg)) | AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (ErrorCode::InternalError, SANITIZED.to_string())
            }
            AppError::BadRequest(msg) => (ErrorCode::BadRequest, msg.clone()),
            AppError::Database(err) => classify_database(err),
        }
    }
}

/// `RowNotFound` is a 404; `uq_*` and `ck_*` constraint violations come back
/// as conflict and validation errors naming the constraint. Anything else
/// from the driver is sanitized.
fn classify_database(err: &sqlx::Error) -> (ErrorCode, String) {
    if let sqlx::Error::RowNotFound = err {
        return (ErrorCode::NotFound, "Resource not found".to_string());
    }

    if let sqlx::Error::Database(db_err) = err {
        let constraint = db_err.constraint().unwrap_or_default();
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) if constraint.starts_with("uq_") => {
                return (
                    ErrorCode::Conflict,
                    format!("Record already exists ({constraint})"),
                );
            }
            Some(CHECK_VIOLATION) if constraint.starts_with("ck_") => {
                return (
                    ErrorCode::ValidationError,
                    format!("Value rejected by {constraint}"),
                );
            }
            _ => {}
        }
    }

    tracing::error!(error = %err, "Database error");
    (ErrorCode::InternalError, SANITIZED.to_string())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, error) = self.classify();
        (code.status(), Json(ErrorBody { error, code })).into_response()
    }
}

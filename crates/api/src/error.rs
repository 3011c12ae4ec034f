use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use jobportal_core::error::CoreError;
use jobportal_core::session::SessionInvalidReason;

use crate::approvals::service::ApprovalError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses
/// with a machine-readable `code`; no admin action is ever silently
/// allowed through on an error path.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `jobportal_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An expected business outcome of the approval workflow.
    #[error(transparent)]
    Approval(#[from] ApprovalError),

    /// A session that failed validation (401 with a reason code).
    #[error("Session invalid: {0}")]
    SessionInvalid(SessionInvalidReason),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The session store could not be reached; trust-critical checks
    /// fail closed, so the caller sees a refusal, not a fallback.
    #[error("Session store unavailable")]
    StoreUnavailable(#[from] jobportal_db::kv::KvError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND".to_string(),
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR".to_string(),
                    msg.clone(),
                ),
                CoreError::Conflict(msg) => {
                    (StatusCode::CONFLICT, "CONFLICT".to_string(), msg.clone())
                }
                CoreError::Unauthorized(msg) => (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED".to_string(),
                    msg.clone(),
                ),
                CoreError::Forbidden(msg) => (
                    StatusCode::FORBIDDEN,
                    "FORBIDDEN".to_string(),
                    msg.clone(),
                ),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR".to_string(),
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Approval workflow outcomes ---
            AppError::Approval(err) => match err {
                ApprovalError::NotFound => (
                    StatusCode::NOT_FOUND,
                    "not_found".to_string(),
                    "Approval request not found".to_string(),
                ),
                ApprovalError::InvalidStatus(status) => (
                    StatusCode::CONFLICT,
                    format!("invalid_status:{status}"),
                    format!("Approval request is {status}"),
                ),
                ApprovalError::SelfApprovalForbidden => (
                    StatusCode::FORBIDDEN,
                    "self_approval_forbidden".to_string(),
                    "The requester of an action may not approve it".to_string(),
                ),
                ApprovalError::RequestMismatch => (
                    StatusCode::CONFLICT,
                    "request_mismatch".to_string(),
                    "Action does not match the approved request".to_string(),
                ),
                ApprovalError::Validation(msg) => (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR".to_string(),
                    msg.clone(),
                ),
                ApprovalError::Database(db_err) => classify_sqlx_error(db_err),
            },

            // --- Session validation failures ---
            AppError::SessionInvalid(reason) => (
                StatusCode::UNAUTHORIZED,
                reason.as_str().to_string(),
                "Session is not valid".to_string(),
            ),

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- Store unavailability (fail closed) ---
            AppError::StoreUnavailable(err) => {
                tracing::error!(error = %err, "Session store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_UNAVAILABLE".to_string(),
                    "Session store is unavailable".to_string(),
                )
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST".to_string(),
                msg.clone(),
            ),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR".to_string(),
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, String, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND".to_string(),
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT".to_string(),
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR".to_string(),
                "An internal error occurred".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR".to_string(),
                "An internal error occurred".to_string(),
            )
        }
    }
}

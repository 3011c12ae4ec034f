//! Session-based authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use jobportal_core::approval::AdminActor;
use jobportal_core::session::SessionRecord;

use crate::error::AppError;
use crate::state::AppState;

/// Authenticated admin extracted from the opaque session id carried in
/// the `Authorization: Bearer` header (or `x-session-id`).
///
/// Validation and touch happen on every authenticated request: the
/// extractor checks all three expiry clocks, refreshes `last_seen`, and
/// records the request path in the session's action history. A failed
/// validation is a 401 whose `code` is one of `session_not_found`,
/// `session_expired`, `session_idle_timeout`, `session_absolute_timeout`.
#[derive(Debug, Clone)]
pub struct SessionAuth {
    /// The live session record.
    pub session: SessionRecord,
    /// Role asserted by the authentication gateway in `x-admin-role`
    /// after credential verification; defaults to `admin`.
    pub role: String,
}

impl SessionAuth {
    /// The caller as an actor for the approval workflow.
    pub fn actor(&self) -> AdminActor {
        AdminActor {
            user_id: self.session.user_id.clone(),
            email: self.session.email.clone(),
            role: self.role.clone(),
        }
    }
}

impl FromRequestParts<AppState> for SessionAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session_id = extract_session_id(parts).ok_or_else(|| {
            AppError::Core(jobportal_core::error::CoreError::Unauthorized(
                "Missing session credential".into(),
            ))
        })?;

        let session = state
            .sessions
            .validate_session(&session_id)
            .await
            .map_err(AppError::SessionInvalid)?;

        // Refresh the idle clock and record the action path. The touch
        // result is advisory; the validated record above is the source
        // of truth for this request.
        let path = parts.uri.path().to_string();
        let session = state
            .sessions
            .touch_session(&session_id, None, Some(&path))
            .await?
            .unwrap_or(session);

        let role = parts
            .headers
            .get("x-admin-role")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("admin")
            .to_string();

        Ok(SessionAuth { session, role })
    }
}

fn extract_session_id(parts: &Parts) -> Option<String> {
    if let Some(header) = parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }
    parts
        .headers
        .get("x-session-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

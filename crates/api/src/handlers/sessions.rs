//! Handlers for the `/sessions` resource.
//!
//! Session creation is invoked by the authentication front-end after it
//! has verified credentials (login or step-up); everything else is
//! self-service session management for the logged-in admin.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use jobportal_core::session::SessionRecord;
use jobportal_core::types::Timestamp;
use jobportal_core::user_agent::{self, DeviceInfo};

use crate::error::{AppError, AppResult};
use crate::middleware::session::SessionAuth;
use crate::response::DataResponse;
use crate::sessions::SessionContext;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /sessions` (called on login and step-up).
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: String,
    pub email: String,
    /// Optional hard ceiling, e.g. the expiry of a step-up grant.
    pub expires_at: Option<Timestamp>,
}

/// Response for `POST /sessions`.
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session: SessionRecord,
    /// Whether this login came from a client tuple never seen for the
    /// user; the caller may require step-up or send an alert.
    pub new_device: bool,
}

/// One entry in the sessions listing.
#[derive(Debug, Serialize)]
pub struct SessionListItem {
    pub id: String,
    pub ip: Option<String>,
    pub device: String,
    pub browser: String,
    pub os: String,
    pub created_at: Timestamp,
    pub last_seen: Timestamp,
    pub is_current_session: bool,
    /// Coarse label from user-agent classification completeness.
    pub risk: &'static str,
}

/// Request body for `POST /sessions/terminate`.
#[derive(Debug, Deserialize)]
pub struct TerminateRequest {
    pub session_id: String,
}

/// Response for the terminate endpoints.
#[derive(Debug, Serialize)]
pub struct TerminateResponse {
    pub removed: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/sessions
///
/// Create a session for an authenticated admin. Client ip and
/// user-agent are taken from the forwarding headers.
pub async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CreateSessionRequest>,
) -> AppResult<Json<DataResponse<CreateSessionResponse>>> {
    if input.user_id.trim().is_empty() || input.email.trim().is_empty() {
        return Err(AppError::BadRequest(
            "user_id and email are required".into(),
        ));
    }

    let ip = client_ip(&headers);
    let user_agent = header_string(&headers, "user-agent");

    // Checked before the new session is written, so the new session
    // itself cannot satisfy the lookup.
    let new_device = state
        .sessions
        .is_new_device(&input.user_id, ip.as_deref(), user_agent.as_deref())
        .await;

    let session = state
        .sessions
        .create_session(SessionContext {
            user_id: input.user_id,
            email: input.email,
            ip,
            user_agent,
            expires_at: input.expires_at,
        })
        .await?
        .ok_or_else(|| AppError::BadRequest("expires_at must be in the future".into()))?;

    Ok(Json(DataResponse {
        data: CreateSessionResponse {
            session,
            new_device,
        },
    }))
}

/// GET /api/v1/sessions
///
/// List the caller's live sessions, most recent activity first.
pub async fn list_sessions(
    State(state): State<AppState>,
    auth: SessionAuth,
) -> AppResult<Json<DataResponse<Vec<SessionListItem>>>> {
    let sessions = state
        .sessions
        .list_user_sessions(&auth.session.user_id)
        .await?;

    let items = sessions
        .into_iter()
        .map(|record| {
            let info = DeviceInfo {
                device: record.device.clone(),
                browser: record.browser.clone(),
                os: record.os.clone(),
            };
            SessionListItem {
                is_current_session: record.id == auth.session.id,
                risk: user_agent::risk_label(&info),
                id: record.id,
                ip: record.ip,
                device: record.device,
                browser: record.browser,
                os: record.os,
                created_at: record.created_at,
                last_seen: record.last_seen,
            }
        })
        .collect();

    Ok(Json(DataResponse { data: items }))
}

/// POST /api/v1/sessions/terminate
///
/// Terminate one of the caller's sessions. Terminating the current
/// session is a usage error, rejected before the service is called.
pub async fn terminate_session(
    State(state): State<AppState>,
    auth: SessionAuth,
    Json(input): Json<TerminateRequest>,
) -> AppResult<Json<DataResponse<TerminateResponse>>> {
    if input.session_id == auth.session.id {
        return Err(AppError::BadRequest(
            "Cannot terminate the current session; use logout instead".into(),
        ));
    }

    // Only the caller's own sessions can be terminated through this
    // endpoint.
    let owned = state
        .sessions
        .list_user_sessions(&auth.session.user_id)
        .await?
        .iter()
        .any(|s| s.id == input.session_id);
    if !owned {
        return Err(AppError::Core(jobportal_core::error::CoreError::NotFound {
            entity: "session",
            id: input.session_id,
        }));
    }

    let removed = state.sessions.terminate_session(&input.session_id).await?;
    Ok(Json(DataResponse {
        data: TerminateResponse {
            removed: usize::from(removed),
        },
    }))
}

/// POST /api/v1/sessions/terminate-others
///
/// Terminate every session of the caller except the current one.
pub async fn terminate_other_sessions(
    State(state): State<AppState>,
    auth: SessionAuth,
) -> AppResult<Json<DataResponse<TerminateResponse>>> {
    let removed = state
        .sessions
        .terminate_other_sessions(&auth.session.user_id, &auth.session.id)
        .await?;
    Ok(Json(DataResponse {
        data: TerminateResponse { removed },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Client ip from `x-forwarded-for` (first hop) or `x-real-ip`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = header_string(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }
    header_string(headers, "x-real-ip")
}

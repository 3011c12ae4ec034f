pub mod approvals;
pub mod health;
pub mod sessions;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /sessions                              create (POST), list own (GET)
/// /sessions/terminate                    terminate one own session (POST)
/// /sessions/terminate-others             terminate all but current (POST)
///
/// /approvals                             create (POST), list (GET)
/// /approvals/{id}                        get (GET)
/// /approvals/{id}/approve                approve (POST)
/// /approvals/{id}/reject                 reject (POST)
/// /approvals/{id}/validate-execution     execution-time check (POST)
/// /approvals/{id}/execute                record execution (POST)
/// ```
///
/// Everything except session creation requires a live session.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/sessions", sessions::router())
        .nest("/approvals", approvals::router())
}

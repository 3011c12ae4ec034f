//! Route definitions for the session registry.

use axum::routing::post;
use axum::Router;

use crate::handlers::sessions;
use crate::state::AppState;

/// Session routes, mounted at `/sessions`.
///
/// ```text
/// POST   /                     create_session (called by the auth gateway)
/// GET    /                     list_sessions
/// POST   /terminate            terminate_session
/// POST   /terminate-others     terminate_other_sessions
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(sessions::create_session).get(sessions::list_sessions),
        )
        .route("/terminate", post(sessions::terminate_session))
        .route("/terminate-others", post(sessions::terminate_other_sessions))
}
